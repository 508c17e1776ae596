use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StreamError;

/// The kernel's transport protocol.
///
/// Any type with `read`/`write`/`close`/`is_closed` is a stream; there is no
/// common base type. Lifecycle: open, then any number of reads and writes,
/// then closed. `close` is idempotent and closed is terminal.
///
/// `read` resolving to `None` means end-of-stream.
#[async_trait]
pub trait ByteStream<T = Bytes>: Send + Sync
where
    T: Send + 'static,
{
    async fn read(&self) -> Result<Option<T>, StreamError>;

    async fn write(&self, chunk: T) -> Result<(), StreamError>;

    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Type-erased, shareable stream.
pub type SharedStream<T = Bytes> = Arc<dyn ByteStream<T>>;

/// Erase a concrete stream into a [`SharedStream`].
pub fn as_byte_stream<T, S>(stream: S) -> SharedStream<T>
where
    T: Send + 'static,
    S: ByteStream<T> + 'static,
{
    Arc::new(stream)
}

/// Forward chunks from `src` to `dst` until `src` reaches end-of-stream.
///
/// Returns the number of chunks forwarded. `dst` is left open; closing it is
/// the caller's decision.
pub async fn pump<T, S, D>(src: &S, dst: &D) -> Result<u64, StreamError>
where
    T: Send + 'static,
    S: ByteStream<T> + ?Sized,
    D: ByteStream<T> + ?Sized,
{
    let mut forwarded = 0;
    while let Some(chunk) = src.read().await? {
        dst.write(chunk).await?;
        forwarded += 1;
    }
    Ok(forwarded)
}
