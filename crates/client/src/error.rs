use std::error::Error;
use std::io;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Errors of the content model and the handler pipeline.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request could not be completed.
    #[error("an error occurred while sending the request: {source}")]
    Request { source: BoxError },

    #[error("cannot write more bytes to the buffer than the configured maximum buffer size: {max_size}")]
    BufferOverflow { max_size: usize },

    #[error("error while copying content to a stream: {source}")]
    StreamCopy { source: BoxError },

    #[error("the stream was already consumed and cannot be read again")]
    AlreadyRead,

    #[error("invalid argument `{name}`: {reason}")]
    Argument { name: &'static str, reason: String },

    #[error("argument `{name}` must not be null")]
    ArgumentNull { name: &'static str },

    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("cannot access a disposed object: {object}")]
    Disposed { object: &'static str },

    #[error("the operation was canceled")]
    Canceled,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("serialize error: {source}")]
    Serialize { source: BoxError },
}

impl HttpError {
    pub fn request<E: Into<BoxError>>(e: E) -> Self {
        Self::Request { source: e.into() }
    }

    pub fn stream_copy<E: Into<BoxError>>(e: E) -> Self {
        Self::StreamCopy { source: e.into() }
    }

    pub fn argument<S: ToString>(name: &'static str, reason: S) -> Self {
        Self::Argument { name, reason: reason.to_string() }
    }

    pub fn argument_null(name: &'static str) -> Self {
        Self::ArgumentNull { name }
    }

    pub fn invalid_operation<S: ToString>(reason: S) -> Self {
        Self::InvalidOperation { reason: reason.to_string() }
    }

    pub fn disposed(object: &'static str) -> Self {
        Self::Disposed { object }
    }

    pub fn serialize<E: Into<BoxError>>(e: E) -> Self {
        Self::Serialize { source: e.into() }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, HttpError::Canceled)
    }

    pub fn is_request_error(&self) -> bool {
        matches!(self, HttpError::Request { .. })
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, HttpError::Disposed { .. })
    }
}

impl From<HttpError> for io::Error {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Io { source } => source,
            HttpError::Canceled => io::Error::new(io::ErrorKind::Interrupted, e),
            e => io::Error::other(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_keeps_cause() {
        let e = HttpError::request(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(e.is_request_error());
        assert!(!e.is_canceled());

        let source = std::error::Error::source(&e).unwrap();
        assert_eq!(source.to_string(), "reset");
    }

    #[test]
    fn io_round_trip() {
        let e: io::Error = HttpError::from(io::Error::from(io::ErrorKind::BrokenPipe)).into();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);

        let e: io::Error = HttpError::Canceled.into();
        assert_eq!(e.kind(), io::ErrorKind::Interrupted);
    }
}
