//! Client side connection handling
//!
//! # Components
//!
//! - [`Connector`]: opens the byte stream to an origin, [`TcpConnector`] being the
//!   plain `http` implementation
//! - [`ClientConnection`]: drives one request/response exchange over that stream:
//!   - encodes the request head and streams the request body
//!   - decodes the response head
//!   - hands the rest of the stream over as a [`ResponseBody`](crate::native::ResponseBody)

mod client_connection;
mod connector;
mod message_writer;

pub use client_connection::ClientConnection;
pub use client_connection::RequestBodyWriter;
pub use connector::BoxedIo;
pub use connector::ClientCertificateOption;
pub use connector::ConnectOptions;
pub use connector::Connector;
pub use connector::Io;
pub use connector::TcpConnector;
