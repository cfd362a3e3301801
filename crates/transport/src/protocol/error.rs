use std::io;
use thiserror::Error;

use crate::native::NativeResponse;

/// Top level error of a native exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect error: {source}")]
    Connect { source: io::Error },

    #[error("response error: {source}")]
    Response {
        #[from]
        source: ParseError,
    },

    #[error("request error: {source}")]
    Request {
        #[from]
        source: SendError,
    },

    #[error("invalid uri: {reason}")]
    InvalidUri { reason: String },

    #[error("the request was aborted")]
    Aborted,

    #[error("too many redirects, the limit is {max_redirects}")]
    TooManyRedirects { max_redirects: u32, response: Box<NativeResponse> },

    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },
}

impl TransportError {
    pub fn connect<E: Into<io::Error>>(e: E) -> Self {
        Self::Connect { source: e.into() }
    }

    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { reason: str.to_string() }
    }

    pub fn invalid_operation<S: ToString>(str: S) -> Self {
        Self::InvalidOperation { reason: str.to_string() }
    }

    /// True when the failure came from an abort of the exchange.
    pub fn is_aborted(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }

    /// Takes the response the server sent despite the failure, if any.
    pub fn into_response(self) -> Result<NativeResponse, Self> {
        match self {
            TransportError::TooManyRedirects { response, .. } => Ok(*response),
            e => Err(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http status code")]
    InvalidStatus,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

impl From<SendError> for io::Error {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Io { source } => source,
            e => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}
