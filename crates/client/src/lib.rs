//! An asynchronous HTTP client pipeline
//!
//! This crate models request and response bodies, chains message handlers in
//! front of the network, and sends requests through
//! [`micro_transport`](micro_transport).
//!
//! # Example
//!
//! ```no_run
//! use http::Uri;
//! use micro_client::content::MultipartFormDataContent;
//! use micro_client::content::StringContent;
//! use micro_client::handler::HttpMessageHandler;
//! use micro_client::message::HttpRequestMessage;
//! use micro_client::transport::TransportHandler;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), micro_client::HttpError> {
//!     let mut form = MultipartFormDataContent::new();
//!     form.add_with_name(StringContent::new("value"), "field")?;
//!
//!     let request = HttpRequestMessage::post(Uri::from_static("http://127.0.0.1:8080/upload"), form);
//!     let handler = TransportHandler::new();
//!     let mut response = handler.send(request, CancellationToken::new()).await?;
//!     response.ensure_success_status_code()?;
//!
//!     if let Some(content) = response.content_mut() {
//!         println!("{}", content.read_as_string().await?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`content`]: body kinds, buffering and the stream copy engine
//! - [`handler`]: the handler trait, delegating and processing stages, decorators
//! - [`transport`]: the terminal handler and its timeout watchdog
//! - [`message`]: request and response messages

pub mod content;
pub mod handler;
pub mod headers;
pub mod helpers;
pub mod message;
pub mod transport;

mod error;

pub use error::BoxError;
pub use error::HttpError;
