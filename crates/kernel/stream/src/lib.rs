//! ByteStream transport for the Hive Kernel.
//!
//! A stream is anything implementing [`ByteStream`]. This crate provides the
//! in-memory pieces other layers build on:
//! - [`create_pipe`]: bounded FIFO with backpressure
//! - [`compose`]: stacked chunk transforms (codecs, ciphers)
//! - [`dev_null`]: discard sink, the default for unconnected stdio
//! - [`pump`]: forward one stream into another
//! - [`create_channel`]: entangled message ports with listener fan-out

pub mod channel;
pub mod compose;
pub mod error;
pub mod null;
pub mod pipe;
pub mod traits;

pub use channel::{create_channel, ListenerId, Port};
pub use compose::{compose, ChunkTransform, Composed, FnTransform};
pub use error::StreamError;
pub use null::{dev_null, DevNull};
pub use pipe::{
    create_pipe, create_pipe_with, PipeEnd, PipeOptions, PipeStats, DEFAULT_HIGH_WATER_MARK,
};
pub use traits::{as_byte_stream, pump, ByteStream, SharedStream};
