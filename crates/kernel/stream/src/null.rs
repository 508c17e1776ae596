use async_trait::async_trait;

use crate::error::StreamError;
use crate::traits::ByteStream;

/// Sink that discards writes and is always at end-of-stream.
///
/// Closing is a no-op, so a `DevNull` never reports closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevNull;

pub fn dev_null() -> DevNull {
    DevNull
}

#[async_trait]
impl<T: Send + 'static> ByteStream<T> for DevNull {
    async fn read(&self) -> Result<Option<T>, StreamError> {
        Ok(None)
    }

    async fn write(&self, _chunk: T) -> Result<(), StreamError> {
        Ok(())
    }

    fn close(&self) {}

    fn is_closed(&self) -> bool {
        false
    }
}
