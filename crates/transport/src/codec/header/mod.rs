//! HTTP header processing for the client side of an exchange.
//!
//! - [`HeaderEncoder`]: serializes the request line and request headers,
//!   writing the framing header that matches the request body
//! - [`HeaderDecoder`]: parses the status line and response headers and
//!   works out how the response body is delimited

mod header_decoder;
mod header_encoder;

pub use header_decoder::{HeaderDecoder, is_chunked};
pub use header_encoder::HeaderEncoder;
