//! HTTP header encoder implementation for serializing HTTP request heads
//!
//! This module writes the request line and header block of an outgoing request.
//! It fills in the `Host` header from the request uri when the caller did not set
//! one, and writes the body framing header matching the payload size.

use crate::protocol::{PayloadSize, RequestHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for HTTP request heads implementing the [`Encoder`] trait.
///
/// Any `Content-Length` or `Transfer-Encoding` header present on the head is replaced
/// by the one derived from the [`PayloadSize`], so the framing on the wire always
/// matches how the body is encoded.
pub struct HeaderEncoder;

impl Encoder<(RequestHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_11 | Version::HTTP_10 => {
                write!(FastWrite(dst), "{} {} {:?}\r\n", head.method().as_str(), head.target(), head.version())?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        if !head.headers().contains_key(header::HOST) {
            let host = host_header(head.uri())?;
            head.headers_mut().insert(header::HOST, host);
        }

        let need_body = head.need_body();
        let headers = head.headers_mut();
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
        match payload_size {
            PayloadSize::Length(n) => {
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");
                headers.insert(header::TRANSFER_ENCODING, CHUNKED);
            }
            // methods that carry a body announce an empty one explicitly
            PayloadSize::Empty | PayloadSize::UntilClose if need_body => {
                const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
                headers.insert(header::CONTENT_LENGTH, ZERO_VALUE);
            }
            PayloadSize::Empty | PayloadSize::UntilClose => {}
        }

        // Write all headers
        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Builds the `Host` header value (`host[:port]`) from the authority, without user info.
fn host_header(uri: &http::Uri) -> Result<HeaderValue, SendError> {
    let host = uri.host().ok_or_else(|| SendError::invalid_header("request uri has no host"))?;
    let value = match uri.port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(SendError::invalid_header)
}

/// Fast writer implementation for writing to BytesMut.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
