//! The content model: message bodies and their content headers.
//!
//! A body is any [`ContentBody`]. Wrapping it in an [`HttpContent`] adds the
//! behavior every body shares:
//!
//! - lazily computed `Content-Length` in [`ContentHeaders`]
//! - bounded buffering with [`HttpContent::load_into_buffer`]
//! - reading as bytes, text or a stream, each buffering first
//! - [`HttpContent::copy_to`] serializing into any [`AsyncWrite`]
//! - idempotent disposal
//!
//! # Example
//!
//! ```no_run
//! use micro_client::content::{HttpContent, StringContent};
//!
//! # async fn example() -> Result<(), micro_client::HttpError> {
//! let mut content = HttpContent::new(StringContent::new("hello"));
//! assert_eq!(content.headers().content_length(), Some(5));
//! assert_eq!(content.read_as_string().await?, "hello");
//! # Ok(())
//! # }
//! ```

mod buffer;
mod byte_array;
mod encoding;
mod form;
mod multipart;
mod multipart_form_data;
mod object;
mod stream;
mod stream_content;
mod stream_copy;
mod string;

use std::fmt;
use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::HttpError;
use crate::headers::ContentHeaders;

use buffer::LimitedBuffer;

pub use byte_array::ByteArrayContent;
pub use encoding::Encoding;
pub use form::FormUrlEncodedContent;
pub use multipart::{MultipartContent, validate_boundary};
pub use multipart_form_data::MultipartFormDataContent;
pub use object::{DisplayMediaTypeFormatter, JsonMediaTypeFormatter, MediaTypeFormatter, ObjectContent};
pub use stream::{ContentStream, ReadStream};
pub use stream_content::StreamContent;
pub use stream_copy::{DEFAULT_BUFFER_SIZE, copy_stream, copy_stream_and_dispose};
pub use string::StringContent;

/// Largest buffer [`HttpContent::load_into_buffer`] accepts.
pub const MAX_BUFFER_SIZE: usize = i32::MAX as usize;

/// A concrete body kind.
///
/// Implementations only know how to write themselves and, when cheap, how long
/// they are. Buffering, reading and length caching live in [`HttpContent`].
#[async_trait]
pub trait ContentBody: Send {
    /// Sets the content headers this body implies, called once on wrap.
    fn init_headers(&self, _headers: &mut ContentHeaders) {}

    /// Writes the whole body into `stream`.
    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError>;

    /// The body length when it can be known without serializing.
    fn try_compute_length(&mut self) -> Option<u64>;

    /// Releases what the body holds. Called at most once.
    fn dispose(&mut self) {}
}

/// A message body with its content headers.
pub struct HttpContent {
    body: Box<dyn ContentBody>,
    headers: ContentHeaders,
    buffered: Option<Bytes>,
    read_stream: Option<Cursor<Bytes>>,
    disposed: bool,
}

impl<B: ContentBody + 'static> From<B> for HttpContent {
    fn from(body: B) -> Self {
        Self::new(body)
    }
}

impl HttpContent {
    pub fn new<B: ContentBody + 'static>(body: B) -> Self {
        let mut headers = ContentHeaders::new();
        body.init_headers(&mut headers);
        Self { body: Box::new(body), headers, buffered: None, read_stream: None, disposed: false }
    }

    /// The content headers, with the content length resolved.
    ///
    /// An explicit length wins. Otherwise a buffered content reports the buffer
    /// length, and an unbuffered one asks its body once and remembers the answer,
    /// including "unknown".
    pub fn headers(&mut self) -> &ContentHeaders {
        self.resolve_length();
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut ContentHeaders {
        &mut self.headers
    }

    /// Shorthand for `headers().content_length()`.
    pub fn content_length(&mut self) -> Option<u64> {
        self.headers().content_length()
    }

    pub fn is_buffered(&self) -> bool {
        self.buffered.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn resolve_length(&mut self) {
        if self.headers.is_content_length_explicit() {
            return;
        }
        if let Some(buffered) = &self.buffered {
            self.headers.set_computed_length(Some(buffered.len() as u64));
        } else if self.headers.is_length_pending() && !self.disposed {
            let length = self.body.try_compute_length();
            trace!(?length, "computed content length");
            self.headers.set_computed_length(length);
        }
    }

    fn check_disposed(&self) -> Result<(), HttpError> {
        if self.disposed { Err(HttpError::disposed("HttpContent")) } else { Ok(()) }
    }

    /// Serializes the body into memory, at most `max_size` bytes of it.
    ///
    /// Does nothing once buffered. Fails with [`HttpError::BufferOverflow`] before
    /// serializing when the known length is already too large, and as soon as a
    /// write crosses the limit otherwise.
    pub async fn load_into_buffer(&mut self, max_size: usize) -> Result<(), HttpError> {
        self.check_disposed()?;
        if max_size > MAX_BUFFER_SIZE {
            return Err(HttpError::argument(
                "max_size",
                format!("the buffer size must be between 0 and {MAX_BUFFER_SIZE}, got {max_size}"),
            ));
        }
        if self.buffered.is_some() {
            return Ok(());
        }

        let length = self.content_length();
        if let Some(length) = length {
            if length > max_size as u64 {
                debug!(length, max_size, "content length exceeds the buffer limit");
                return Err(HttpError::BufferOverflow { max_size });
            }
        }

        let capacity = length.and_then(|length| usize::try_from(length).ok()).unwrap_or(0);
        let mut buffer = LimitedBuffer::new(max_size, capacity);
        match self.body.serialize_to_stream(&mut buffer).await {
            Ok(()) => {}
            Err(_) if buffer.is_overflowed() => return Err(HttpError::BufferOverflow { max_size }),
            Err(e) => return Err(e),
        }

        let bytes = buffer.into_bytes();
        trace!(len = bytes.len(), "buffered content");
        self.buffered = Some(bytes);
        Ok(())
    }

    /// The whole body, buffering it first.
    pub async fn read_as_bytes(&mut self) -> Result<Bytes, HttpError> {
        self.load_into_buffer(MAX_BUFFER_SIZE).await?;
        self.buffered.clone().ok_or_else(|| HttpError::invalid_operation("content is not buffered"))
    }

    /// The body decoded as text.
    ///
    /// The charset of the content type decides the encoding, then a leading byte
    /// order mark, then UTF-8. A byte order mark matching the encoding is skipped.
    pub async fn read_as_string(&mut self) -> Result<String, HttpError> {
        let bytes = self.read_as_bytes().await?;
        let declared = self.headers.encoding()?;
        Ok(decode_text(&bytes, declared))
    }

    /// Deserializes a JSON body.
    pub async fn read_as_json<T: DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        let bytes = self.read_as_bytes().await?;
        serde_json::from_slice(&bytes).map_err(HttpError::serialize)
    }

    /// A readable view over the buffered body.
    ///
    /// The same stream is returned on every call, so reads continue where the
    /// previous caller stopped.
    pub async fn read_as_stream(&mut self) -> Result<&mut Cursor<Bytes>, HttpError> {
        self.load_into_buffer(MAX_BUFFER_SIZE).await?;
        let buffered = self.buffered.clone().unwrap_or_default();
        Ok(self.read_stream.get_or_insert_with(|| Cursor::new(buffered)))
    }

    /// Writes the body into `destination`.
    ///
    /// A buffered body is written from memory, so it can be copied any number of
    /// times. I/O failures surface as [`HttpError::StreamCopy`].
    pub async fn copy_to<W>(&mut self, destination: &mut W) -> Result<(), HttpError>
    where
        W: AsyncWrite + Send + Unpin,
    {
        self.check_disposed()?;
        let result = match &self.buffered {
            Some(buffered) => destination.write_all(buffered).await.map_err(HttpError::from),
            None => self.body.serialize_to_stream(destination).await,
        };

        result.map_err(|e| match e {
            e @ (HttpError::Io { .. } | HttpError::Disposed { .. }) => HttpError::stream_copy(e),
            e => e,
        })
    }

    /// Releases the body and the buffer. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.body.dispose();
        self.buffered = None;
        self.read_stream = None;
    }
}

fn decode_text(bytes: &[u8], declared: Option<Encoding>) -> String {
    match declared {
        Some(encoding) => encoding.decode(bytes.strip_prefix(encoding.preamble()).unwrap_or(bytes)),
        None => match Encoding::detect_bom(bytes) {
            Some((encoding, bom_len)) => encoding.decode(&bytes[bom_len..]),
            None => Encoding::Utf8.decode(bytes),
        },
    }
}

impl fmt::Debug for HttpContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContent")
            .field("headers", &self.headers)
            .field("buffered", &self.buffered.as_ref().map(Bytes::len))
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::CONTENT_TYPE;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;

    /// Body writing `chunks` one write at a time, counting length lookups and writes.
    struct CountingBody {
        chunks: Vec<&'static [u8]>,
        known_length: bool,
        lookups: Arc<AtomicUsize>,
        serializations: Arc<AtomicUsize>,
    }

    impl CountingBody {
        fn new(chunks: Vec<&'static [u8]>, known_length: bool) -> Self {
            Self {
                chunks,
                known_length,
                lookups: Arc::new(AtomicUsize::new(0)),
                serializations: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ContentBody for CountingBody {
        async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
            self.serializations.fetch_add(1, Ordering::SeqCst);
            for chunk in &self.chunks {
                stream.write_all(chunk).await?;
            }
            Ok(())
        }

        fn try_compute_length(&mut self) -> Option<u64> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.known_length.then(|| self.chunks.iter().map(|c| c.len() as u64).sum())
        }
    }

    #[tokio::test]
    async fn length_is_computed_once() {
        let body = CountingBody::new(vec![b"ab", b"cd"], false);
        let lookups = Arc::clone(&body.lookups);
        let mut content = HttpContent::new(body);

        assert_eq!(content.headers().content_length(), None);
        assert_eq!(content.headers().content_length(), None);
        assert_eq!(lookups.load(Ordering::SeqCst), 1);

        content.load_into_buffer(16).await.unwrap();
        assert_eq!(content.headers().content_length(), Some(4));
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explicit_length_wins() {
        let mut content = HttpContent::new(ByteArrayContent::new(&b"abc"[..]));
        content.headers_mut().set_content_length(Some(10));
        content.load_into_buffer(16).await.unwrap();
        assert_eq!(content.headers().content_length(), Some(10));
    }

    #[tokio::test]
    async fn known_length_over_limit_fails_before_serializing() {
        let body = CountingBody::new(vec![b"0123456789"], true);
        let serializations = Arc::clone(&body.serializations);
        let mut content = HttpContent::new(body);

        let err = content.load_into_buffer(5).await.unwrap_err();
        assert!(matches!(err, HttpError::BufferOverflow { max_size: 5 }));
        assert_eq!(serializations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_length_overflow_fails_on_the_crossing_write() {
        let mut content = HttpContent::new(CountingBody::new(vec![b"abc", b"def", b"ghi"], false));
        let err = content.load_into_buffer(5).await.unwrap_err();
        assert!(matches!(err, HttpError::BufferOverflow { max_size: 5 }));
        assert!(!content.is_buffered());
    }

    #[tokio::test]
    async fn buffering_is_idempotent() {
        let body = CountingBody::new(vec![b"hello"], true);
        let serializations = Arc::clone(&body.serializations);
        let mut content = HttpContent::new(body);

        content.load_into_buffer(MAX_BUFFER_SIZE).await.unwrap();
        content.load_into_buffer(MAX_BUFFER_SIZE).await.unwrap();
        assert_eq!(content.read_as_bytes().await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(serializations.load(Ordering::SeqCst), 1);

        let mut first = Vec::new();
        let mut second = Vec::new();
        content.copy_to(&mut first).await.unwrap();
        content.copy_to(&mut second).await.unwrap();
        assert_eq!(first, b"hello");
        assert_eq!(second, b"hello");
        assert_eq!(serializations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejects_oversized_limit() {
        let mut content = HttpContent::new(ByteArrayContent::new(Bytes::new()));
        let err = content.load_into_buffer(MAX_BUFFER_SIZE + 1).await.unwrap_err();
        assert!(matches!(err, HttpError::Argument { name: "max_size", .. }));
    }

    #[tokio::test]
    async fn text_decoding_order() {
        // declared charset, matching preamble stripped
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(Encoding::Utf16Le.encode("hé"));
        let mut content = HttpContent::new(ByteArrayContent::new(bytes));
        content.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-16"));
        assert_eq!(content.read_as_string().await.unwrap(), "hé");

        // no charset, byte order mark decides
        let mut bytes = vec![0xFE, 0xFF];
        bytes.extend(Encoding::Utf16Be.encode("ok"));
        let mut content = HttpContent::new(ByteArrayContent::new(bytes));
        assert_eq!(content.read_as_string().await.unwrap(), "ok");

        // neither, utf-8
        let mut content = HttpContent::new(ByteArrayContent::new("plain €".as_bytes().to_vec()));
        assert_eq!(content.read_as_string().await.unwrap(), "plain €");

        let mut content = HttpContent::new(ByteArrayContent::new(&b"x"[..]));
        content.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=klingon"));
        assert!(matches!(content.read_as_string().await, Err(HttpError::InvalidOperation { .. })));
    }

    #[tokio::test]
    async fn read_stream_is_shared() {
        let mut content = HttpContent::new(ByteArrayContent::new(&b"abcdef"[..]));

        let mut head = [0u8; 2];
        content.read_as_stream().await.unwrap().read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"ab");

        let mut rest = Vec::new();
        content.read_as_stream().await.unwrap().read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"cdef");
    }

    #[tokio::test]
    async fn disposed_content_refuses_work() {
        let mut content = HttpContent::new(ByteArrayContent::new(&b"abc"[..]));
        content.dispose();
        content.dispose();

        assert!(content.is_disposed());
        assert!(content.read_as_bytes().await.unwrap_err().is_disposed());
        assert!(content.copy_to(&mut Vec::new()).await.unwrap_err().is_disposed());
    }

    #[tokio::test]
    async fn copy_failure_is_a_stream_copy_error() {
        let mut content = HttpContent::new(ByteArrayContent::new(&b"abc"[..]));
        let (mut writer, reader) = tokio::io::duplex(1);
        drop(reader);

        let err = content.copy_to(&mut writer).await.unwrap_err();
        assert!(matches!(err, HttpError::StreamCopy { .. }));
    }

    #[tokio::test]
    async fn reads_json() {
        let mut content = HttpContent::new(ByteArrayContent::new(&br#"{"a":[1,2]}"#[..]));
        let value: serde_json::Value = content.read_as_json().await.unwrap();
        assert_eq!(value["a"][1], 2);
    }
}
