use std::io;
use std::io::ErrorKind;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tracing::{error, trace};

use crate::codec::ResponseDecoder;
use crate::connection::message_writer::MessageWriter;
use crate::native::ResponseBody;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHead, ResponseHead, SendError};

const READ_BUFFER_SIZE: usize = 8 * 1024;
const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// A single request/response exchange over a byte stream.
///
/// The exchange runs in order:
/// 1. [`send_head`](Self::send_head) writes the request line and headers
/// 2. the request body, if any, is written through [`body_writer`](Self::body_writer)
/// 3. [`finish`](Self::finish) terminates the body and flushes
/// 4. [`read_response`](Self::read_response) decodes the response head
/// 5. [`into_body`](Self::into_body) turns the rest of the stream into the response body
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct ClientConnection<R, W> {
    framed_read: FramedRead<R, ResponseDecoder>,
    writer: MessageWriter<W>,
}

impl<R, W> ClientConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, ResponseDecoder::new(), READ_BUFFER_SIZE),
            writer: MessageWriter::with_capacity(writer, WRITE_BUFFER_SIZE),
        }
    }

    pub async fn send_head(&mut self, head: RequestHead, payload_size: PayloadSize) -> Result<(), SendError> {
        *self.framed_read.decoder_mut() = ResponseDecoder::for_method(head.method());
        trace!(method = %head.method(), request_target = head.target(), ?payload_size, "send request head");
        self.writer.write(Message::<_, Bytes>::Header((head, payload_size)))?;
        self.writer.flush().await
    }

    pub fn body_writer(&mut self) -> RequestBodyWriter<'_, W> {
        RequestBodyWriter { writer: &mut self.writer }
    }

    /// Ends the request body and flushes everything to the peer.
    ///
    /// A body shorter than the declared `Content-Length` is an error here.
    pub async fn finish(&mut self) -> Result<(), SendError> {
        if !self.writer.is_idle() {
            self.writer.write(Message::<(RequestHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof))?;
        }
        self.writer.flush().await
    }

    pub async fn read_response(&mut self) -> Result<(ResponseHead, PayloadSize), ParseError> {
        match self.framed_read.next().await {
            Some(Ok(Message::Header(header))) => Ok(header),
            Some(Ok(Message::Payload(_))) => {
                error!("receive response body before the response head");
                Err(ParseError::invalid_body("need response head while receive body"))
            }
            Some(Err(e)) => {
                error!(cause = %e, "can't receive the response head");
                Err(e)
            }
            None => Err(io::Error::new(ErrorKind::UnexpectedEof, "connection closed before the response head").into()),
        }
    }
}

impl<R, W> ClientConnection<R, W>
where
    R: AsyncRead + Send + Sync + Unpin + 'static,
{
    /// Hands the remaining response payload over to a [`ResponseBody`].
    pub fn into_body(self, payload_size: PayloadSize) -> ResponseBody {
        ResponseBody::from_framed(self.framed_read, payload_size)
    }
}

/// [`AsyncWrite`] adapter that encodes every write as request body bytes.
///
/// Writes are buffered and handed to the underlying writer before the next
/// write is accepted, so at most one encoded chunk is pending at a time.
pub struct RequestBodyWriter<'conn, W> {
    writer: &'conn mut MessageWriter<W>,
}

impl<W> AsyncWrite for RequestBodyWriter<'_, W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.writer.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        this.writer.write(Message::<(RequestHead, PayloadSize), &[u8]>::Payload(PayloadItem::Chunk(buf)))?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().writer.poll_flush(cx)
    }

    // the connection stays open for the response, finishing the body is `ClientConnection::finish`
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().writer.poll_flush(cx)
    }
}
