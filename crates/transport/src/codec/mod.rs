//! HTTP codec module for the client side of an exchange
//!
//! - [`RequestEncoder`]: encodes the outgoing request head and body items
//! - [`ResponseDecoder`]: decodes the incoming response head and body items
//!
//! Both are state machines over the [`header`] and [`body`] codecs, usable with
//! [`tokio_util::codec::FramedRead`] and [`tokio_util::codec::FramedWrite`].
//!
//! # Example
//!
//! ```no_run
//! use micro_transport::codec::{RequestEncoder, ResponseDecoder};
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = ResponseDecoder::new();
//! let mut buffer = BytesMut::from(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]);
//! let head = decoder.decode(&mut buffer);
//! let _encoder = RequestEncoder::new();
//! ```

mod body;
mod header;
mod request_encoder;
mod response_decoder;

pub use header::is_chunked;
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
