use std::fmt;
use std::io;
use std::io::ErrorKind;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use http::{HeaderMap, StatusCode, Uri, Version};
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::error;

use crate::codec::ResponseDecoder;
use crate::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, reason_phrase};

type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// The body of a native response as an [`AsyncRead`].
///
/// Decoding failures of the underlying payload are reported as [`io::Error`]s.
pub struct ResponseBody {
    reader: StreamReader<BodyStream, Bytes>,
    payload_size: PayloadSize,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { reader: StreamReader::new(Box::pin(stream::empty())), payload_size: PayloadSize::Empty }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let payload_size = PayloadSize::new_length(bytes.len() as u64);
        Self { reader: StreamReader::new(Box::pin(stream::iter([Ok(bytes)]))), payload_size }
    }

    pub(crate) fn from_framed<R>(framed_read: FramedRead<R, ResponseDecoder>, payload_size: PayloadSize) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let chunks = stream::unfold(Some(framed_read), |state| async move {
            let mut framed_read = state?;
            match framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => Some((Ok(bytes), Some(framed_read))),
                Some(Ok(Message::Payload(PayloadItem::Eof))) | None => None,
                Some(Ok(Message::Header(_))) => {
                    error!("receive a response head while reading the response body");
                    Some((Err(io::Error::new(ErrorKind::InvalidData, "unexpected response head in body")), None))
                }
                Some(Err(e)) => {
                    error!(cause = %e, "failed to read the response body");
                    Some((Err(io::Error::new(ErrorKind::InvalidData, e)), None))
                }
            }
        });

        Self { reader: StreamReader::new(Box::pin(chunks)), payload_size }
    }

    /// How the server framed the body.
    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// The exact body length, when the server declared one.
    pub fn content_length(&self) -> Option<u64> {
        self.payload_size.exact()
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").field("payload_size", &self.payload_size).finish_non_exhaustive()
    }
}

impl AsyncRead for ResponseBody {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl AsyncBufRead for ResponseBody {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().reader).poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.get_mut().reader).consume(amt);
    }
}

/// A response received by an [`Exchange`](crate::native::Exchange).
#[derive(Debug)]
pub struct NativeResponse {
    head: ResponseHead,
    uri: Uri,
    body: ResponseBody,
}

impl NativeResponse {
    pub fn new(head: ResponseHead, uri: Uri, body: ResponseBody) -> Self {
        Self { head, uri, body }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    /// The reason phrase as received, or the canonical one for the status.
    pub fn reason_phrase(&self) -> Option<String> {
        reason_phrase(&self.head)
    }

    /// The uri that produced this response, after redirects.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn into_parts(self) -> (ResponseHead, Uri, ResponseBody) {
        (self.head, self.uri, self.body)
    }
}
