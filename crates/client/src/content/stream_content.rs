use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::HttpError;
use crate::content::{ContentBody, ContentStream, DEFAULT_BUFFER_SIZE, copy_stream};

/// Content read from a [`ContentStream`].
///
/// A seekable stream is rewound to where it started before every serialization
/// after the first one. A forward only stream can be serialized once.
#[derive(Debug)]
pub struct StreamContent<S> {
    stream: Option<S>,
    start_position: Option<u64>,
    buffer_size: usize,
    consumed: bool,
}

impl<S: ContentStream> StreamContent<S> {
    pub fn new(stream: S) -> Self {
        let start_position = if stream.can_seek() { stream.position() } else { None };
        Self { stream: Some(stream), start_position, buffer_size: DEFAULT_BUFFER_SIZE, consumed: false }
    }

    pub fn with_buffer_size(stream: S, buffer_size: usize) -> Result<Self, HttpError> {
        if buffer_size == 0 {
            return Err(HttpError::argument("buffer_size", "must be greater than zero"));
        }
        Ok(Self { buffer_size, ..Self::new(stream) })
    }
}

#[async_trait]
impl<S: ContentStream> ContentBody for StreamContent<S> {
    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
        let source = self.stream.as_mut().ok_or_else(|| HttpError::disposed("StreamContent"))?;
        if self.consumed {
            let start = self.start_position.ok_or(HttpError::AlreadyRead)?;
            debug!(start, "rewinding stream content");
            source.seek_to(start)?;
        }

        self.consumed = true;
        copy_stream(source, stream, self.buffer_size).await?;
        Ok(())
    }

    fn try_compute_length(&mut self) -> Option<u64> {
        let stream = self.stream.as_ref()?;
        if !stream.can_seek() {
            return None;
        }
        stream.length()?.checked_sub(self.start_position?)
    }

    fn dispose(&mut self) {
        self.stream = None;
    }
}
