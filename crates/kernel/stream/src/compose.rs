//! Layered chunk transforms over a stream.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StreamError;
use crate::traits::ByteStream;

/// One layer of a composed stream.
///
/// `transform` runs on chunks leaving `read()`; `inverse` runs on chunks
/// entering `write()`. Self-inverse codecs only implement `transform`.
pub trait ChunkTransform<T>: Send + Sync {
    fn transform(&self, chunk: T) -> T;

    fn inverse(&self, chunk: T) -> T {
        self.transform(chunk)
    }
}

/// Closure-backed [`ChunkTransform`].
pub struct FnTransform<F, G> {
    on_read: F,
    on_write: G,
}

impl<F, G> FnTransform<F, G> {
    pub fn new(on_read: F, on_write: G) -> Self {
        Self { on_read, on_write }
    }
}

impl<T, F, G> ChunkTransform<T> for FnTransform<F, G>
where
    F: Fn(T) -> T + Send + Sync,
    G: Fn(T) -> T + Send + Sync,
{
    fn transform(&self, chunk: T) -> T {
        (self.on_read)(chunk)
    }

    fn inverse(&self, chunk: T) -> T {
        (self.on_write)(chunk)
    }
}

/// Stream wrapper produced by [`compose`].
pub struct Composed<T, S> {
    inner: S,
    layers: Vec<Arc<dyn ChunkTransform<T>>>,
    _chunk: PhantomData<fn(T) -> T>,
}

/// Wrap `stream` so reads pass through `layers` in list order and writes
/// pass through them in reverse.
///
/// With layers `[cipher, codec]`, a write compresses then encrypts and a read
/// decrypts then decompresses.
pub fn compose<T, S>(stream: S, layers: Vec<Arc<dyn ChunkTransform<T>>>) -> Composed<T, S>
where
    T: Send + 'static,
    S: ByteStream<T>,
{
    Composed {
        inner: stream,
        layers,
        _chunk: PhantomData,
    }
}

impl<T, S> Composed<T, S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

#[async_trait]
impl<T, S> ByteStream<T> for Composed<T, S>
where
    T: Send + 'static,
    S: ByteStream<T>,
{
    async fn read(&self) -> Result<Option<T>, StreamError> {
        let chunk = self.inner.read().await?;
        Ok(chunk.map(|c| self.layers.iter().fold(c, |acc, layer| layer.transform(acc))))
    }

    async fn write(&self, chunk: T) -> Result<(), StreamError> {
        let encoded = self
            .layers
            .iter()
            .rev()
            .fold(chunk, |acc, layer| layer.inverse(acc));
        self.inner.write(encoded).await
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::create_pipe;
    use bytes::Bytes;

    struct Xor(u8);

    impl ChunkTransform<Bytes> for Xor {
        fn transform(&self, chunk: Bytes) -> Bytes {
            chunk.iter().map(|b| b ^ self.0).collect::<Vec<u8>>().into()
        }
    }

    fn tagging(tag: &'static str) -> Arc<dyn ChunkTransform<String>> {
        Arc::new(FnTransform::new(
            move |s: String| s.strip_suffix(tag).unwrap_or(&s).to_string(),
            move |s: String| format!("{s}{tag}"),
        ))
    }

    #[tokio::test]
    async fn round_trip_through_codec_pair() {
        let (reader, _writer) = create_pipe::<Bytes>(4);
        let layers: Vec<Arc<dyn ChunkTransform<Bytes>>> =
            vec![Arc::new(Xor(0x5a)), Arc::new(Xor(0x0f))];
        let stream = compose(reader, layers);

        stream.write(Bytes::from_static(b"hello")).await.unwrap();
        let back = stream.read().await.unwrap().unwrap();
        assert_eq!(back, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn write_applies_layers_in_reverse() {
        let (reader, writer) = create_pipe::<String>(4);
        let stream = compose(writer, vec![tagging("|outer"), tagging("|inner")]);

        stream.write("msg".to_string()).await.unwrap();
        // inner layer ran first on write, outer layer last
        assert_eq!(reader.read().await.unwrap().unwrap(), "msg|inner|outer");
    }

    #[tokio::test]
    async fn read_applies_layers_in_order() {
        let (reader, writer) = create_pipe::<String>(4);
        let stream = compose(reader, vec![tagging("|outer"), tagging("|inner")]);

        writer.write("msg|inner|outer".to_string()).await.unwrap();
        assert_eq!(stream.read().await.unwrap().unwrap(), "msg");
    }

    #[tokio::test]
    async fn close_and_eof_pass_through() {
        let (reader, _writer) = create_pipe::<String>(4);
        let stream = compose(reader, vec![tagging("|x")]);
        assert_eq!(stream.layer_count(), 1);

        stream.close();
        assert!(stream.is_closed());
        assert!(stream.inner().is_closed());
        assert_eq!(stream.read().await.unwrap(), None);
        assert_eq!(stream.write("late".into()).await, Err(StreamError::Closed));
    }
}
