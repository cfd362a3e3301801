use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::HttpError;
use crate::content::ContentBody;

/// Content over an in-memory byte range.
///
/// The length is always known and the body can be serialized any number of times.
#[derive(Debug, Clone)]
pub struct ByteArrayContent {
    bytes: Bytes,
}

impl ByteArrayContent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Content over `count` bytes starting at `offset`.
    pub fn with_range(bytes: impl Into<Bytes>, offset: usize, count: usize) -> Result<Self, HttpError> {
        let bytes = bytes.into();
        if offset > bytes.len() {
            return Err(HttpError::argument("offset", format!("{offset} is past the end of {} bytes", bytes.len())));
        }
        if count > bytes.len() - offset {
            return Err(HttpError::argument(
                "count",
                format!("{count} bytes from offset {offset} overrun {} bytes", bytes.len()),
            ));
        }
        Ok(Self { bytes: bytes.slice(offset..offset + count) })
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[async_trait]
impl ContentBody for ByteArrayContent {
    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
        stream.write_all(&self.bytes).await?;
        Ok(())
    }

    fn try_compute_length(&mut self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::HttpContent;

    #[tokio::test]
    async fn serializes_the_range() {
        let mut content = HttpContent::new(ByteArrayContent::with_range(&b"0123456789"[..], 2, 3).unwrap());
        assert_eq!(content.headers().content_length(), Some(3));
        assert_eq!(content.read_as_bytes().await.unwrap(), Bytes::from_static(b"234"));
    }

    #[test]
    fn rejects_out_of_range() {
        let err = ByteArrayContent::with_range(&b"abc"[..], 4, 0).unwrap_err();
        assert!(matches!(err, HttpError::Argument { name: "offset", .. }));

        let err = ByteArrayContent::with_range(&b"abc"[..], 1, 3).unwrap_err();
        assert!(matches!(err, HttpError::Argument { name: "count", .. }));

        assert!(ByteArrayContent::with_range(&b"abc"[..], 3, 0).unwrap().as_bytes().is_empty());
    }
}
