//! Stream to stream copy through one fixed size buffer.
//!
//! A read is only issued once the previous write completed and the other way
//! round, so a copy holds at most one buffer of data whatever the total size.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::content::ContentStream;

/// Default size of the intermediate copy buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Copies `source` into `destination` until the source is exhausted.
///
/// Sources backed by memory are written with a single bulk write. The first
/// failing read or write ends the copy with that error. Returns the number of
/// bytes copied.
pub async fn copy_stream<S, D>(source: &mut S, destination: &mut D, buffer_size: usize) -> io::Result<u64>
where
    S: ContentStream + ?Sized,
    D: AsyncWrite + Unpin + ?Sized,
{
    if let Some(memory) = source.remaining_memory() {
        let len = memory.len();
        destination.write_all(memory).await?;
        source.consume_memory(len);
        destination.flush().await?;
        trace!(len, "copied in-memory source");
        return Ok(len as u64);
    }

    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        destination.write_all(&buffer[..read]).await?;
        total += read as u64;
    }

    destination.flush().await?;
    trace!(len = total, "copied stream");
    Ok(total)
}

/// Like [`copy_stream`], but takes ownership of the source and drops it once the
/// copy ended, successfully or not.
pub async fn copy_stream_and_dispose<S, D>(mut source: S, destination: &mut D, buffer_size: usize) -> io::Result<u64>
where
    S: ContentStream,
    D: AsyncWrite + Unpin + ?Sized,
{
    let result = copy_stream(&mut source, destination, buffer_size).await;
    drop(source);
    result
}
