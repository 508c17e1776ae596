//! Observability stores for the Hive Kernel.
//!
//! [`Tracer`] and [`Logger`] keep the most recent records in a fixed-capacity
//! [`RingBuffer`] and push each new record to every live [`Subscription`].
//! Subscriptions never replay history; use `snapshot()` for that.

pub mod hub;
pub mod logger;
pub mod ring;
pub mod tracer;

pub use hub::{FanOut, Subscription, SubscriptionId, DEFAULT_SUBSCRIBER_BUFFER};
pub use logger::{
    LogEntry, LogFilter, LogLevel, Logger, LoggerOptions, ModuleLogger, UnknownLogLevel,
    DEFAULT_LOG_CAPACITY, LOG_TRACE_KIND,
};
pub use ring::RingBuffer;
pub use tracer::{TraceEvent, TraceRecord, Tracer, TracerOptions, DEFAULT_TRACE_CAPACITY};
