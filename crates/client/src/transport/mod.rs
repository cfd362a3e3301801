//! The terminal handler: sends messages over the native HTTP transport.

mod handler;
mod request_state;
mod timeout;

pub use handler::TransportHandler;
pub use timeout::{DEFAULT_TIMEOUT, TimeoutManager};

pub(crate) use request_state::RequestState;
