//! Streaming decoder for HTTP responses.
//!
//! The decoder yields a [`Message::Header`] for the response head followed by
//! [`Message::Payload`] items until [`PayloadItem::Eof`]. Interim `1xx` responses
//! other than `101 Switching Protocols` are consumed silently.

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHead};
use bytes::BytesMut;
use http::{Method, StatusCode};
use tokio_util::codec::Decoder;
use tracing::trace;

/// A decoder for HTTP responses that handles both the head and the body
///
/// # State Machine
///
/// - `payload_decoder == None`: currently parsing the response head
/// - `payload_decoder == Some(_)`: currently parsing the response body
pub struct ResponseDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a decoder for the response to a request sent with `method`.
    pub fn for_method(method: &Method) -> Self {
        Self { header_decoder: HeaderDecoder::new(method == Method::HEAD), payload_decoder: None }
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder::default(), payload_decoder: None }
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        loop {
            let Some((head, payload_size)) = self.header_decoder.decode(src)? else {
                return Ok(None);
            };

            if head.status().is_informational() && head.status() != StatusCode::SWITCHING_PROTOCOLS {
                trace!(status = %head.status(), "skip interim response");
                continue;
            }

            self.payload_decoder = Some(payload_size.into());
            return Ok(Some(Message::Header((head, payload_size))));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode_eof(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };
            return Ok(message);
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_header("connection closed in the middle of the response head")),
        }
    }
}
