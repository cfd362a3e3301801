//! An asynchronous micro HTTP/1.1 client transport
//!
//! This crate performs the network side of a single HTTP exchange on top of tokio:
//! it opens a connection, writes the request head and a streamed body, and decodes
//! the response into a head plus a streamed body.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 request encoding
//! - Content-Length and chunked request bodies
//! - Chunked, length delimited and read-until-close response bodies
//! - Automatic redirects with a configurable limit
//! - Cookie container and `Basic` credentials
//! - Abort from another task at any suspension point
//!
//! # Example
//!
//! ```no_run
//! use http::{Method, Uri};
//! use micro_transport::native::{HttpTransport, NativeRequest};
//! use tokio::io::AsyncReadExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = NativeRequest::new(Method::GET, Uri::from_static("http://127.0.0.1:8080/"))?;
//!     let exchange = HttpTransport::new().begin(request);
//!
//!     let mut response = exchange.get_response().await?;
//!     let mut body = String::new();
//!     response.body_mut().read_to_string(&mut body).await?;
//!     println!("{} {body}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`native`]: request options, the exchange and its abort handle, responses
//! - [`connection`]: connectors and the single exchange client connection
//! - [`codec`]: request encoding and response decoding
//! - [`protocol`]: heads, payload framing and errors

pub mod codec;
pub mod connection;
pub mod native;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
