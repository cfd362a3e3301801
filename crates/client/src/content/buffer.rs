use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWrite;
use tracing::warn;

use crate::HttpError;

/// In-memory sink that refuses any write taking it past `max_size` bytes.
///
/// The check runs on every write, so a body is never held beyond the limit
/// however the writer slices it.
#[derive(Debug)]
pub(crate) struct LimitedBuffer {
    buffer: BytesMut,
    max_size: usize,
    overflowed: bool,
}

impl LimitedBuffer {
    pub(crate) fn new(max_size: usize, capacity: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(capacity.min(max_size)), max_size, overflowed: false }
    }

    pub(crate) fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}

impl AsyncWrite for LimitedBuffer {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.buffer.len() + buf.len() > this.max_size {
            warn!(max_size = this.max_size, "content exceeds the buffer limit");
            this.overflowed = true;
            return Poll::Ready(Err(io::Error::other(HttpError::BufferOverflow { max_size: this.max_size })));
        }

        this.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
