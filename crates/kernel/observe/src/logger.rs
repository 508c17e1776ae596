use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hive_kernel_platform::Clock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::hub::{FanOut, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
use crate::ring::RingBuffer;
use crate::tracer::{TraceRecord, Tracer};

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Trace kind under which log entries are mirrored into the tracer.
pub const LOG_TRACE_KIND: &str = "log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(UnknownLogLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub module: String,
    pub message: String,
    #[serde(default)]
    pub fields: Value,
}

/// Selects log entries by minimum level and exact module name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub min_level: Option<LogLevel>,
    pub module: Option<String>,
}

impl LogFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn at_least(level: LogLevel) -> Self {
        Self {
            min_level: Some(level),
            module: None,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        let level_match = self.min_level.map_or(true, |min| entry.level >= min);
        let module_match = self.module.as_deref().map_or(true, |m| entry.module == m);
        level_match && module_match
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerOptions {
    pub capacity: usize,
    /// Entries below this level are discarded at the call site.
    pub min_level: LogLevel,
    pub subscriber_buffer: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOG_CAPACITY,
            min_level: LogLevel::Debug,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

struct LoggerState {
    last_id: u64,
    ring: RingBuffer<LogEntry>,
}

struct LoggerInner {
    clock: Arc<dyn Clock>,
    tracer: Option<Arc<Tracer>>,
    min_level: LogLevel,
    state: Mutex<LoggerState>,
    hub: FanOut<LogEntry>,
}

/// Kernel log store.
///
/// Entries land in a ring buffer, go out to live subscribers, are mirrored
/// into the wrapped [`Tracer`] (kind `log`) and are forwarded to `tracing`.
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    pub fn new(clock: Arc<dyn Clock>, tracer: Option<Arc<Tracer>>) -> Self {
        Self::with_options(clock, tracer, LoggerOptions::default())
    }

    pub fn with_options(
        clock: Arc<dyn Clock>,
        tracer: Option<Arc<Tracer>>,
        options: LoggerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                clock,
                tracer,
                min_level: options.min_level,
                state: Mutex::new(LoggerState {
                    last_id: 0,
                    ring: RingBuffer::new(options.capacity),
                }),
                hub: FanOut::new(options.subscriber_buffer),
            }),
        }
    }

    /// Record an entry. Returns `None` if `level` is below the minimum.
    pub fn log(
        &self,
        level: LogLevel,
        module: &str,
        message: impl Into<String>,
        fields: Value,
    ) -> Option<LogEntry> {
        if level < self.inner.min_level {
            return None;
        }
        let message = message.into();
        forward_to_tracing(level, module, &message, &fields);

        let entry = {
            let mut state = self.inner.state.lock();
            state.last_id += 1;
            let entry = LogEntry {
                id: state.last_id,
                timestamp: self.inner.clock.now_wall(),
                level,
                module: module.to_string(),
                message,
                fields,
            };
            state.ring.push(entry.clone());
            self.inner.hub.publish(&entry);
            entry
        };

        if let Some(tracer) = &self.inner.tracer {
            tracer.emit(TraceRecord::new(LOG_TRACE_KIND).with_data(json!({
                "level": entry.level,
                "module": entry.module,
                "message": entry.message,
                "fields": entry.fields,
            })));
        }
        Some(entry)
    }

    pub fn debug(&self, module: &str, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Debug, module, message, Value::Null)
    }

    pub fn info(&self, module: &str, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Info, module, message, Value::Null)
    }

    pub fn warn(&self, module: &str, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Warn, module, message, Value::Null)
    }

    pub fn error(&self, module: &str, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Error, module, message, Value::Null)
    }

    /// Logger bound to one module name.
    pub fn scoped(&self, module: impl Into<String>) -> ModuleLogger {
        ModuleLogger {
            logger: self.clone(),
            module: module.into(),
        }
    }

    /// Live entries matching `filter`, from now on.
    pub fn entries(&self, filter: LogFilter) -> Subscription<LogEntry> {
        let _state = self.inner.state.lock();
        self.inner.hub.subscribe_filtered(move |e: &LogEntry| filter.matches(e))
    }

    pub fn snapshot(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.inner
            .state
            .lock()
            .ring
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn min_level(&self) -> LogLevel {
        self.inner.min_level
    }

    pub fn tracer(&self) -> Option<&Arc<Tracer>> {
        self.inner.tracer.as_ref()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.hub.subscriber_count()
    }

    pub fn clear(&self) {
        self.inner.state.lock().ring.clear();
        self.inner.hub.close_all();
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.inner.min_level)
            .field("len", &self.len())
            .field("traced", &self.inner.tracer.is_some())
            .finish()
    }
}

fn forward_to_tracing(level: LogLevel, module: &str, message: &str, fields: &Value) {
    match level {
        LogLevel::Debug => tracing::debug!(module, %fields, "{message}"),
        LogLevel::Info => tracing::info!(module, %fields, "{message}"),
        LogLevel::Warn => tracing::warn!(module, %fields, "{message}"),
        LogLevel::Error => tracing::error!(module, %fields, "{message}"),
    }
}

/// [`Logger`] handle that stamps every entry with one module name.
#[derive(Debug, Clone)]
pub struct ModuleLogger {
    logger: Logger,
    module: String,
}

impl ModuleLogger {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        fields: Value,
    ) -> Option<LogEntry> {
        self.logger.log(level, &self.module, message, fields)
    }

    pub fn debug(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.logger.debug(&self.module, message)
    }

    pub fn info(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.logger.info(&self.module, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.logger.warn(&self.module, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.logger.error(&self.module, message)
    }

    /// Live entries from this module only.
    pub fn entries(&self, min_level: Option<LogLevel>) -> Subscription<LogEntry> {
        self.logger.entries(LogFilter {
            min_level,
            module: Some(self.module.clone()),
        })
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.logger.snapshot(&LogFilter::all().module(self.module.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_kernel_platform::ManualClock;

    fn logger(min_level: LogLevel, tracer: Option<Arc<Tracer>>) -> Logger {
        Logger::with_options(
            Arc::new(ManualClock::new()),
            tracer,
            LoggerOptions {
                capacity: 4,
                min_level,
                subscriber_buffer: 16,
            },
        )
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn below_min_level_is_discarded() {
        let log = logger(LogLevel::Info, None);
        assert!(log.debug("net", "chatter").is_none());
        assert!(log.info("net", "up").is_some());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn snapshot_filters_by_level_and_module() {
        let log = logger(LogLevel::Debug, None);
        log.debug("fs", "stat");
        log.warn("fs", "slow disk");
        log.error("net", "reset");

        assert_eq!(log.snapshot(&LogFilter::all()).len(), 3);
        let warn_up = log.snapshot(&LogFilter::at_least(LogLevel::Warn));
        let messages: Vec<&str> = warn_up.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["slow disk", "reset"]);
        let fs_only = log.snapshot(&LogFilter::all().module("fs"));
        assert_eq!(fs_only.len(), 2);
    }

    #[test]
    fn ring_evicts_oldest() {
        let log = logger(LogLevel::Debug, None);
        for i in 0..6 {
            log.info("m", format!("line {i}"));
        }
        let ids: Vec<u64> = log.snapshot(&LogFilter::all()).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn scoped_logger_stamps_module() {
        let log = logger(LogLevel::Debug, None);
        let fs = log.scoped("fs");
        let mut live = fs.entries(Some(LogLevel::Info));

        fs.debug("ignored by filter");
        log.info("net", "other module");
        fs.info("mounted");

        let entry = live.next().await.unwrap();
        assert_eq!(entry.module, "fs");
        assert_eq!(entry.message, "mounted");
        assert!(live.try_next().is_none());
        assert_eq!(fs.snapshot().len(), 2);
    }

    #[test]
    fn mirrors_into_tracer() {
        let tracer = Arc::new(Tracer::new(Arc::new(ManualClock::new())));
        let log = logger(LogLevel::Debug, Some(tracer.clone()));

        log.scoped("kernel").warn("low memory");
        log.debug("kernel", "noise");

        let mirrored = tracer.snapshot_kind(LOG_TRACE_KIND);
        assert_eq!(mirrored.len(), 2);
        assert_eq!(mirrored[0].data["level"], "warn");
        assert_eq!(mirrored[0].data["module"], "kernel");
        assert_eq!(mirrored[0].data["message"], "low memory");
    }

    #[test]
    fn clear_detaches_subscribers() {
        let log = logger(LogLevel::Debug, None);
        let _live = log.entries(LogFilter::all());
        log.info("m", "x");
        log.clear();

        assert!(log.is_empty());
        assert_eq!(log.subscriber_count(), 0);
    }
}
