use async_trait::async_trait;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use mime::Mime;
use tokio::io::AsyncWrite;

use crate::HttpError;
use crate::content::{ByteArrayContent, ContentBody, Encoding};
use crate::headers::ContentHeaders;

/// Text content, encoded once on construction.
///
/// The content type carries the media type, `text/plain` by default, and the
/// charset of the encoding.
#[derive(Debug, Clone)]
pub struct StringContent {
    inner: ByteArrayContent,
    content_type: HeaderValue,
}

impl StringContent {
    pub fn new(text: &str) -> Self {
        Self::with_encoding(text, Encoding::Utf8)
    }

    pub fn with_encoding(text: &str, encoding: Encoding) -> Self {
        let content_type = HeaderValue::from_static(match encoding {
            Encoding::Utf8 => "text/plain; charset=utf-8",
            Encoding::Utf16Le => "text/plain; charset=utf-16",
            Encoding::Utf16Be => "text/plain; charset=utf-16BE",
            Encoding::Ascii => "text/plain; charset=us-ascii",
            Encoding::Latin1 => "text/plain; charset=iso-8859-1",
        });
        Self { inner: ByteArrayContent::new(encoding.encode(text)), content_type }
    }

    pub fn with_media_type(text: &str, encoding: Encoding, media_type: &str) -> Result<Self, HttpError> {
        let mime: Mime = media_type.parse().map_err(|e| HttpError::argument("media_type", e))?;
        let content_type = HeaderValue::from_str(&format!("{}; charset={encoding}", mime.essence_str()))
            .map_err(|e| HttpError::argument("media_type", e))?;
        Ok(Self { inner: ByteArrayContent::new(encoding.encode(text)), content_type })
    }
}

#[async_trait]
impl ContentBody for StringContent {
    fn init_headers(&self, headers: &mut ContentHeaders) {
        headers.insert(CONTENT_TYPE, self.content_type.clone());
    }

    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
        self.inner.serialize_to_stream(stream).await
    }

    fn try_compute_length(&mut self) -> Option<u64> {
        self.inner.try_compute_length()
    }
}
