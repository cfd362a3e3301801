//! Core HTTP protocol abstractions for the client side of an exchange.
//!
//! # Architecture
//!
//! - **Message Handling** ([`message`]): Core message types and payload processing
//!   - [`Message`]: Represents either a head or payload chunks
//!   - [`PayloadItem`]: Handles individual payload chunks and EOF
//!   - [`PayloadSize`]: Tracks payload framing information
//!
//! - **Request Processing** ([`request`]): [`RequestHead`] wraps the outgoing request line and headers
//!
//! - **Response Processing** ([`response`]): [`ResponseHead`] plus the wire [`ReasonPhrase`]
//!
//! - **Error Handling** ([`error`]):
//!   - [`TransportError`]: Top-level error type of an exchange
//!   - [`ParseError`]: Response parsing errors
//!   - [`SendError`]: Request sending errors

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHead;

mod response;
pub use response::ReasonPhrase;
pub use response::ResponseHead;
pub use response::reason_phrase;

mod error;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;
