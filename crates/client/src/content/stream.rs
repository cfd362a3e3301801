//! Readable sources for stream based content.

use std::io;
use std::io::{Cursor, ErrorKind};
use std::pin::Pin;
use std::task::{Context, Poll};

use micro_transport::native::ResponseBody;
use tokio::io::{AsyncRead, ReadBuf};

/// A readable source together with what it can do besides reading.
///
/// Seekable sources can be rewound, which makes content over them replayable.
/// Sources backed by memory expose their unread bytes so copies can skip the
/// intermediate buffer.
pub trait ContentStream: AsyncRead + Send + Unpin {
    fn can_seek(&self) -> bool {
        false
    }

    /// Total length of a seekable source.
    fn length(&self) -> Option<u64> {
        None
    }

    /// Current read position of a seekable source.
    fn position(&self) -> Option<u64> {
        None
    }

    fn seek_to(&mut self, _position: u64) -> io::Result<()> {
        Err(io::Error::new(ErrorKind::Unsupported, "the stream does not support seeking"))
    }

    /// The unread bytes of a source backed by memory.
    fn remaining_memory(&self) -> Option<&[u8]> {
        None
    }

    /// Marks `amount` bytes of [`remaining_memory`](Self::remaining_memory) as read.
    fn consume_memory(&mut self, _amount: usize) {}
}

impl<T> ContentStream for Cursor<T>
where
    T: AsRef<[u8]> + Send + Unpin,
{
    fn can_seek(&self) -> bool {
        true
    }

    fn length(&self) -> Option<u64> {
        Some(self.get_ref().as_ref().len() as u64)
    }

    fn position(&self) -> Option<u64> {
        Some(Cursor::position(self))
    }

    fn seek_to(&mut self, position: u64) -> io::Result<()> {
        self.set_position(position);
        Ok(())
    }

    fn remaining_memory(&self) -> Option<&[u8]> {
        let bytes = self.get_ref().as_ref();
        let start = usize::try_from(Cursor::position(self)).map_or(bytes.len(), |position| position.min(bytes.len()));
        Some(&bytes[start..])
    }

    fn consume_memory(&mut self, amount: usize) {
        self.set_position(Cursor::position(self) + amount as u64);
    }
}

impl ContentStream for ResponseBody {}

impl ContentStream for Box<dyn ContentStream> {
    fn can_seek(&self) -> bool {
        (**self).can_seek()
    }

    fn length(&self) -> Option<u64> {
        (**self).length()
    }

    fn position(&self) -> Option<u64> {
        (**self).position()
    }

    fn seek_to(&mut self, position: u64) -> io::Result<()> {
        (**self).seek_to(position)
    }

    fn remaining_memory(&self) -> Option<&[u8]> {
        (**self).remaining_memory()
    }

    fn consume_memory(&mut self, amount: usize) {
        (**self).consume_memory(amount);
    }
}

/// Adapts any [`AsyncRead`] into a forward only [`ContentStream`].
#[derive(Debug)]
pub struct ReadStream<R> {
    inner: R,
}

impl<R> ReadStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ReadStream<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<R: AsyncRead + Send + Unpin> ContentStream for ReadStream<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn cursor_capabilities() {
        let mut cursor = Cursor::new(b"hello".to_vec());
        assert!(cursor.can_seek());
        assert_eq!(ContentStream::length(&cursor), Some(5));

        let mut buf = [0u8; 2];
        cursor.read_exact(&mut buf).await.unwrap();
        assert_eq!(ContentStream::position(&cursor), Some(2));
        assert_eq!(cursor.remaining_memory(), Some(&b"llo"[..]));

        cursor.seek_to(0).unwrap();
        assert_eq!(cursor.remaining_memory(), Some(&b"hello"[..]));
    }

    #[test]
    fn read_stream_is_forward_only() {
        let mut stream = ReadStream::new(tokio::io::empty());
        assert!(!stream.can_seek());
        assert!(stream.remaining_memory().is_none());
        assert_eq!(stream.seek_to(0).unwrap_err().kind(), ErrorKind::Unsupported);
    }
}
