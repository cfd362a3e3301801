//! Decoder for response bodies sent with `Transfer-Encoding: chunked`.
//!
//! Chunk extensions and trailer fields are accepted and discarded, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Decoder;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::Size, remaining_size: 0 }
    }

    pub fn is_finish(&self) -> bool {
        self.state == ChunkedState::End
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    Size,
    SizeLws,
    Extension,
    SizeLf,
    Body,
    BodyCr,
    BodyLf,
    Trailer,
    TrailerLf,
    EndCr,
    EndLf,
    End,
}

fn invalid(reason: &'static str) -> ParseError {
    ParseError::io(io::Error::new(ErrorKind::InvalidInput, reason))
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        use ChunkedState::*;

        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if self.state == Body {
                if self.remaining_size == 0 {
                    self.state = BodyCr;
                    continue;
                }
                if src.is_empty() {
                    return Ok(None);
                }

                let read_size = usize::try_from(self.remaining_size).unwrap_or(usize::MAX).min(src.len());
                self.remaining_size -= read_size as u64;
                if self.remaining_size == 0 {
                    self.state = BodyCr;
                }

                let bytes = src.split_to(read_size).freeze();
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            if src.is_empty() {
                return Ok(None);
            }

            let byte = src.get_u8();
            self.state = match (self.state, byte) {
                (Size, b) if b.is_ascii_hexdigit() => {
                    // is_ascii_hexdigit guarantees to_digit succeeds
                    let digit = u64::from(char::from(b).to_digit(16).unwrap_or_default());
                    self.remaining_size = self
                        .remaining_size
                        .checked_mul(16)
                        .and_then(|size| size.checked_add(digit))
                        .ok_or_else(|| invalid("invalid overflow chunked length"))?;
                    Size
                }
                (Size | SizeLws, b'\t' | b' ') => SizeLws,
                (Size | SizeLws, b';') => Extension,
                (Size | SizeLws | Extension, b'\r') => SizeLf,
                (Size, _) => return Err(invalid("invalid chunk size line: Invalid Size")),
                (SizeLws, _) => return Err(invalid("invalid chunk size linear white space")),
                (Extension, b'\n') => return Err(invalid("invalid chunk extension contains newline")),
                (Extension, _) => Extension,
                (SizeLf, b'\n') if self.remaining_size == 0 => EndCr,
                (SizeLf, b'\n') => Body,
                (SizeLf, _) => return Err(invalid("invalid chunk size LF")),
                (BodyCr, b'\r') => BodyLf,
                (BodyCr, _) => return Err(invalid("invalid chunk body CR")),
                (BodyLf, b'\n') => Size,
                (BodyLf, _) => return Err(invalid("invalid chunk body LF")),
                (Trailer, b'\r') => TrailerLf,
                (Trailer, _) => Trailer,
                (TrailerLf, b'\n') => EndCr,
                (TrailerLf, _) => return Err(invalid("invalid trailer end LF")),
                (EndCr, b'\r') => EndLf,
                (EndCr, _) => Trailer,
                (EndLf, b'\n') => End,
                (EndLf, _) => return Err(invalid("invalid chunk end LF")),
                (Body | End, _) => unreachable!("handled before reading a byte"),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_multiple_chunks() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b", world"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.is_finish());
    }

    #[test]
    fn test_extensions_and_trailers() {
        let mut buffer = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0\r\nTrailer: value\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_incomplete_chunk() {
        let mut buffer = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hel"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\n0\r\n\r\n");

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"lo"));
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_invalid_input() {
        let mut decoder = ChunkedDecoder::new();
        assert!(decoder.decode(&mut BytesMut::from(&b"xyz\r\n"[..])).is_err());

        let mut decoder = ChunkedDecoder::new();
        let mut buffer = BytesMut::from(&b"5\r\nhelloBad"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_chunk());
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_upper_case_size() {
        let mut buffer = BytesMut::from(&b"A\r\n0123456789\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), 10);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
