//! HTTP header decoder implementation for parsing HTTP response heads
//!
//! This module decodes the status line and header block of a response with `httparse`
//! and decides how the body that follows is framed.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only supports HTTP/1.0 and HTTP/1.1

use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderName, HeaderValue, Response, StatusCode};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, ReasonPhrase, ResponseHead};

/// Maximum number of headers allowed in a response
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP response heads implementing the [`Decoder`] trait.
///
/// `head_request` marks responses to a `HEAD` request, which never carry a body
/// whatever their framing headers say.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder {
    head_request: bool,
}

impl HeaderDecoder {
    pub fn new(head_request: bool) -> Self {
        Self { head_request }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (ResponseHead, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // "HTTP/1.1 200 \r\n\r\n" is the shortest response we could accept
        if src.len() < 17 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut res = httparse::Response::new(&mut headers);

        let parsed_result = res.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(head_size = body_offset, "parsed response head");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let version = match res.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(res.version)),
                };

                let status = res.code.and_then(|code| StatusCode::from_u16(code).ok()).ok_or(ParseError::InvalidStatus)?;

                let mut head = Response::new(());
                *head.status_mut() = status;
                *head.version_mut() = version;

                if let Some(reason) = res.reason {
                    if Some(reason) != status.canonical_reason() {
                        head.extensions_mut().insert(ReasonPhrase::new(Bytes::copy_from_slice(reason.as_bytes())));
                    }
                }

                let header_map = head.headers_mut();
                header_map.reserve(res.headers.len());
                for header in res.headers.iter() {
                    let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
                    let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
                    header_map.append(name, value);
                }

                src.advance(body_offset);

                let payload_size = parse_payload(&head, self.head_request)?;
                Ok(Some((head, payload_size)))
            }
            // If parsing incomplete, ensure current buffer size does not exceed limit
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Determines how the response body is framed, following
/// [RFC 9112 Section 6.3](https://www.rfc-editor.org/rfc/rfc9112#section-6.3).
fn parse_payload(head: &ResponseHead, head_request: bool) -> Result<PayloadSize, ParseError> {
    let status = head.status();
    if head_request || status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return Ok(PayloadSize::new_empty());
    }

    let te_header = head.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = head.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::UntilClose),

        (te_value @ Some(_), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::new_chunked())
            } else {
                Ok(PayloadSize::UntilClose)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;

            let length =
                cl_str.trim().parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::new_length(length))
        }

        (Some(_), Some(_)) => {
            warn!("transfer_encoding and content_length both present in response headers");
            Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
        }
    }
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 9112, chunked must be the last encoding if present.
pub fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Version};
    use indoc::indoc;

    #[test]
    fn check_is_chunked() {
        let headers = HeaderMap::new();
        assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));

        let mut headers = HeaderMap::new();
        headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
        assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));

        headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
        assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
    }

    #[test]
    fn from_server() {
        let str = indoc! {"
        HTTP/1.1 201 Created\r
        Content-Type: text/plain\r
        Content-Length: 5\r
        Set-Cookie: a=1\r
        Set-Cookie: b=2\r
        \r
        hello"};

        let mut buf = BytesMut::from(str);
        let (head, payload_size) = HeaderDecoder::default().decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.status(), StatusCode::CREATED);
        assert_eq!(head.version(), Version::HTTP_11);
        assert!(head.extensions().get::<ReasonPhrase>().is_none());
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(head.headers().get_all(http::header::SET_COOKIE).iter().count(), 2);
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn keeps_custom_reason_phrase() {
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 Awesome\r\n\r\n"[..]);
        let (head, payload_size) = HeaderDecoder::default().decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.version(), Version::HTTP_10);
        assert_eq!(head.extensions().get::<ReasonPhrase>().unwrap().as_bytes(), b"Awesome");
        assert_eq!(payload_size, PayloadSize::UntilClose);
    }

    #[test]
    fn head_and_no_content_have_no_body() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n"[..]);
        let (_, payload_size) = HeaderDecoder::new(true).decode(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_empty());

        let mut buf = BytesMut::from(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]);
        let (_, payload_size) = HeaderDecoder::default().decode(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_empty());
    }

    #[test]
    fn partial_head_needs_more_data() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Le"[..]);
        assert!(HeaderDecoder::default().decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 27);
    }
}
