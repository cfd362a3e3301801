//! HTTP response head handling implementation.
//!
//! The head of a received response is represented with the standard `http::Response`
//! type and an empty body placeholder. The reason phrase sent by the server is kept
//! as a [`ReasonPhrase`] extension so callers can surface non canonical phrases.

use bytes::Bytes;
use http::Response;

/// Type alias for HTTP response headers.
///
/// This type represents the header portion of an HTTP response, using
/// `http::Response<()>` with an empty body placeholder.
pub type ResponseHead = Response<()>;

/// The reason phrase of an HTTP/1 status line, stored in the response extensions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReasonPhrase(Bytes);

impl ReasonPhrase {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The phrase as text, obs-text bytes are replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

/// Returns the reason phrase of the response: the one sent on the wire when present,
/// otherwise the canonical phrase of the status code.
pub fn reason_phrase(head: &ResponseHead) -> Option<String> {
    match head.extensions().get::<ReasonPhrase>() {
        Some(reason) => Some(reason.to_string_lossy()),
        None => head.status().canonical_reason().map(str::to_owned),
    }
}
