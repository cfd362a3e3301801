use async_trait::async_trait;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::HttpError;
use crate::content::{ContentBody, Encoding};
use crate::headers::ContentHeaders;

/// Turns values into bytes of one media type.
pub trait MediaTypeFormatter<T>: Send + Sync {
    /// The `Content-Type` of formatted values.
    fn content_type(&self) -> HeaderValue;

    fn format(&self, value: &T) -> Result<Vec<u8>, HttpError>;
}

/// Formats values as UTF-8 JSON with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMediaTypeFormatter;

impl<T: Serialize> MediaTypeFormatter<T> for JsonMediaTypeFormatter {
    fn content_type(&self) -> HeaderValue {
        HeaderValue::from_static("application/json; charset=utf-8")
    }

    fn format(&self, value: &T) -> Result<Vec<u8>, HttpError> {
        serde_json::to_vec(value).map_err(HttpError::serialize)
    }
}

/// Content holding a value that is formatted when serialized.
///
/// The length is unknown until the value was formatted, so sending it buffers.
#[derive(Debug, Clone)]
pub struct ObjectContent<T, F = JsonMediaTypeFormatter> {
    value: T,
    formatter: F,
}

impl<T: Serialize> ObjectContent<T> {
    pub fn json(value: T) -> Self {
        Self { value, formatter: JsonMediaTypeFormatter }
    }
}

impl<T, F: MediaTypeFormatter<T>> ObjectContent<T, F> {
    pub fn new(value: T, formatter: F) -> Self {
        Self { value, formatter }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn formatter(&self) -> &F {
        &self.formatter
    }
}

#[async_trait]
impl<T, F> ContentBody for ObjectContent<T, F>
where
    T: Send + Sync,
    F: MediaTypeFormatter<T>,
{
    fn init_headers(&self, headers: &mut ContentHeaders) {
        headers.insert(CONTENT_TYPE, self.formatter.content_type());
    }

    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
        let bytes = self.formatter.format(&self.value)?;
        stream.write_all(&bytes).await?;
        Ok(())
    }

    fn try_compute_length(&mut self) -> Option<u64> {
        None
    }
}

/// Formats values as text of a fixed media type through their `Display`.
#[derive(Debug, Clone)]
pub struct DisplayMediaTypeFormatter {
    content_type: HeaderValue,
    encoding: Encoding,
}

impl DisplayMediaTypeFormatter {
    pub fn new(content_type: HeaderValue, encoding: Encoding) -> Self {
        Self { content_type, encoding }
    }
}

impl<T: std::fmt::Display> MediaTypeFormatter<T> for DisplayMediaTypeFormatter {
    fn content_type(&self) -> HeaderValue {
        self.content_type.clone()
    }

    fn format(&self, value: &T) -> Result<Vec<u8>, HttpError> {
        Ok(self.encoding.encode(&value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::HttpContent;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[tokio::test]
    async fn json_value() {
        let mut content = HttpContent::new(ObjectContent::json(Point { x: 1, y: -2 }));
        assert_eq!(content.headers().get(CONTENT_TYPE).unwrap(), "application/json; charset=utf-8");
        assert_eq!(content.headers().content_length(), None);

        assert_eq!(content.read_as_string().await.unwrap(), r#"{"x":1,"y":-2}"#);
        assert_eq!(content.headers().content_length(), Some(14));
        assert_eq!(content.read_as_json::<Point>().await.unwrap(), Point { x: 1, y: -2 });
    }

    #[tokio::test]
    async fn display_formatter() {
        let formatter = DisplayMediaTypeFormatter::new(HeaderValue::from_static("text/csv"), Encoding::Latin1);
        let mut content = HttpContent::new(ObjectContent::new("é,1", formatter));
        assert_eq!(content.read_as_bytes().await.unwrap().as_ref(), &[0xE9, b',', b'1']);
    }
}
