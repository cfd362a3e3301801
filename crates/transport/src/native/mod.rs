//! The native transport request life cycle.
//!
//! A [`NativeRequest`] describes what to send, [`HttpTransport::begin`] turns it
//! into an [`Exchange`] which streams the request body and resolves to a
//! [`NativeResponse`]. Redirects and a `Basic` challenge are followed inside the
//! exchange, and an [`AbortHandle`] stops it from another task.

mod cookie;
mod credentials;
mod exchange;
mod request;
mod response_body;

pub use cookie::Cookie;
pub use cookie::CookieContainer;
pub use credentials::Credentials;
pub use exchange::AbortHandle;
pub use exchange::Exchange;
pub use exchange::HttpTransport;
pub use exchange::RequestStream;
pub use exchange::resolve_location;
pub use request::DEFAULT_MAX_REDIRECTS;
pub use request::NativeRequest;
pub use request::RequestOptions;
pub use response_body::NativeResponse;
pub use response_body::ResponseBody;
