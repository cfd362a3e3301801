//! HTTP body handling module for request and response payloads
//!
//! # Components
//!
//! ## Decoders (response side)
//! - [`ChunkedDecoder`]: Handles chunked transfer encoded payloads
//! - [`LengthDecoder`]: Processes fixed-length payloads
//! - [`PayloadDecoder`]: Coordinates the decoding strategies, including read-until-close
//!
//! ## Encoders (request side)
//! - [`ChunkedEncoder`]: Implements chunked transfer encoding
//! - [`LengthEncoder`]: Handles fixed-length payload encoding
//! - [`PayloadEncoder`]: Main encoder that manages different encoding strategies

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
