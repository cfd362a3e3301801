//! `multipart/*` content, framed as in RFC 2046.
//!
//! ```text
//! --boundary\r\n
//! Part-Header: value\r\n
//! \r\n
//! part body
//! \r\n--boundary\r\n
//! ...
//! \r\n--boundary--\r\n
//! ```

use async_trait::async_trait;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;
use uuid::Uuid;

use crate::HttpError;
use crate::content::{ContentBody, HttpContent};
use crate::headers::ContentHeaders;

const MAX_BOUNDARY_LEN: usize = 70;
const CRLF: &str = "\r\n";

/// Checks a boundary against RFC 2046: 1 to 70 characters from a restricted set,
/// not ending with a space.
pub fn validate_boundary(boundary: &str) -> Result<(), HttpError> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(HttpError::argument("boundary", format!("length must be between 1 and {MAX_BOUNDARY_LEN}")));
    }
    if boundary.ends_with(' ') {
        return Err(HttpError::argument("boundary", "must not end with a space"));
    }
    if let Some(c) = boundary.chars().find(|&c| !(c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c))) {
        return Err(HttpError::argument("boundary", format!("invalid character `{c}`")));
    }
    Ok(())
}

/// A sequence of nested contents separated by a boundary.
#[derive(Debug)]
pub struct MultipartContent {
    subtype: String,
    boundary: String,
    parts: Vec<HttpContent>,
}

impl Default for MultipartContent {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartContent {
    /// `multipart/mixed` with a random boundary.
    pub fn new() -> Self {
        Self::with_random_boundary("mixed")
    }

    pub(super) fn with_random_boundary(subtype: &str) -> Self {
        Self { subtype: subtype.to_string(), boundary: Uuid::new_v4().to_string(), parts: Vec::new() }
    }

    pub fn with_subtype(subtype: &str) -> Result<Self, HttpError> {
        Self::with_boundary(subtype, &Uuid::new_v4().to_string())
    }

    pub fn with_boundary(subtype: &str, boundary: &str) -> Result<Self, HttpError> {
        let subtype = subtype.trim();
        if subtype.is_empty() {
            return Err(HttpError::argument("subtype", "must not be empty"));
        }
        validate_boundary(boundary)?;
        Ok(Self { subtype: subtype.to_string(), boundary: boundary.to_string(), parts: Vec::new() })
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn add(&mut self, content: impl Into<HttpContent>) {
        self.parts.push(content.into());
    }

    pub fn parts(&self) -> &[HttpContent] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [HttpContent] {
        &mut self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn content_type(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!("multipart/{}; boundary=\"{}\"", self.subtype, self.boundary)).ok()
    }
}

/// `Content-Type` as `content-type` is stored, `Content-Type` as it is written.
fn title_case(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn part_headers(headers: &ContentHeaders) -> String {
    let mut block = String::new();
    for (name, value) in headers.joined() {
        block.push_str(&title_case(name.as_str()));
        block.push_str(": ");
        block.push_str(&value);
        block.push_str(CRLF);
    }
    block.push_str(CRLF);
    block
}

#[async_trait]
impl ContentBody for MultipartContent {
    fn init_headers(&self, headers: &mut ContentHeaders) {
        if let Some(content_type) = self.content_type() {
            headers.insert(CONTENT_TYPE, content_type);
        }
    }

    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
        let boundary = &self.boundary;
        stream.write_all(format!("--{boundary}{CRLF}").as_bytes()).await?;

        for (index, part) in self.parts.iter_mut().enumerate() {
            if index > 0 {
                stream.write_all(format!("{CRLF}--{boundary}{CRLF}").as_bytes()).await?;
            }
            stream.write_all(part_headers(part.headers()).as_bytes()).await?;
            part.copy_to(&mut &mut *stream).await?;
        }

        stream.write_all(format!("{CRLF}--{boundary}--{CRLF}").as_bytes()).await?;
        trace!(parts = self.parts.len(), "serialized multipart content");
        Ok(())
    }

    fn try_compute_length(&mut self) -> Option<u64> {
        let boundary_len = self.boundary.len() as u64;
        // "--B\r\n" ahead of the first part, "\r\n--B--\r\n" after the last
        let mut length = (2 + boundary_len + 2) + (2 + 2 + boundary_len + 2 + 2);

        for (index, part) in self.parts.iter_mut().enumerate() {
            if index > 0 {
                // "\r\n--B\r\n"
                length += 2 + 2 + boundary_len + 2;
            }
            length += part_headers(part.headers()).len() as u64;
            length += part.headers().content_length()?;
        }
        Some(length)
    }

    fn dispose(&mut self) {
        for part in &mut self.parts {
            part.dispose();
        }
    }
}
