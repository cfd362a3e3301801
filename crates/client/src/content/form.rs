use async_trait::async_trait;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio::io::AsyncWrite;

use crate::HttpError;
use crate::content::{ByteArrayContent, ContentBody};
use crate::headers::ContentHeaders;

/// Everything but unreserved characters is escaped. Spaces become `+` afterwards.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// `application/x-www-form-urlencoded` content built from name/value pairs.
#[derive(Debug, Clone)]
pub struct FormUrlEncodedContent {
    inner: ByteArrayContent,
}

impl FormUrlEncodedContent {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = pairs
            .into_iter()
            .map(|(name, value)| format!("{}={}", encode(name.as_ref()), encode(value.as_ref())))
            .collect::<Vec<_>>()
            .join("&");
        Self { inner: ByteArrayContent::new(encoded) }
    }
}

fn encode(data: &str) -> String {
    utf8_percent_encode(data, FORM_VALUE).to_string().replace("%20", "+")
}

#[async_trait]
impl ContentBody for FormUrlEncodedContent {
    fn init_headers(&self, headers: &mut ContentHeaders) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
    }

    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
        self.inner.serialize_to_stream(stream).await
    }

    fn try_compute_length(&mut self) -> Option<u64> {
        self.inner.try_compute_length()
    }
}
