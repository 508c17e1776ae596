//! Configuration for the Hive Kernel

use hive_kernel_chaos::ChaosConfig;
use hive_kernel_observe::LogLevel;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Kernel configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub resources: ResourceConfig,

    #[serde(default)]
    pub tracer: TracerConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub streams: StreamConfig,

    /// Global fault-injection defaults
    #[serde(default)]
    pub chaos: ChaosConfig,

    /// Seed for the kernel RandomSource; OS entropy when unset
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Host `tracing` output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_max_handles")]
    pub max_handles: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_handles: default_max_handles(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    #[serde(default = "default_ring_capacity")]
    pub capacity: usize,

    /// Per-subscriber channel depth
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            capacity: default_ring_capacity(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_ring_capacity")]
    pub capacity: usize,

    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            capacity: default_ring_capacity(),
            min_level: default_min_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            high_water_mark: default_high_water_mark(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_max_handles() -> usize {
    hive_kernel_resources::DEFAULT_MAX_SIZE
}

fn default_ring_capacity() -> usize {
    1000
}

fn default_subscriber_buffer() -> usize {
    hive_kernel_observe::DEFAULT_SUBSCRIBER_BUFFER
}

fn default_min_level() -> LogLevel {
    LogLevel::Debug
}

fn default_high_water_mark() -> usize {
    hive_kernel_stream::DEFAULT_HIGH_WATER_MARK
}

fn default_log_level() -> String {
    "info".to_string()
}

impl KernelConfig {
    /// Load configuration: defaults, then an optional file, then `HIVE_`
    /// environment variables (`HIVE_TRACER__CAPACITY=50`).
    pub fn load(path: Option<&str>) -> Result<Self, KernelError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&KernelConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HIVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: KernelConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        let non_zero = [
            ("resources.max_handles", self.resources.max_handles),
            ("tracer.capacity", self.tracer.capacity),
            ("tracer.subscriber_buffer", self.tracer.subscriber_buffer),
            ("logger.capacity", self.logger.capacity),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(KernelError::Config(format!("{field} must be greater than zero")));
            }
        }
        self.chaos
            .validate()
            .map_err(|e| KernelError::Config(format!("chaos: {e}")))
    }

    /// Deterministic configuration for tests and simulations.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KernelConfig::default();
        assert_eq!(config.resources.max_handles, 4096);
        assert_eq!(config.tracer.capacity, 1000);
        assert_eq!(config.tracer.subscriber_buffer, 256);
        assert_eq!(config.logger.capacity, 1000);
        assert_eq!(config.logger.min_level, LogLevel::Debug);
        assert_eq!(config.streams.high_water_mark, 16);
        assert!(!config.chaos.enabled);
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: KernelConfig =
            serde_json::from_str(r#"{"tracer": {"capacity": 10}, "logger": {"min_level": "warn"}}"#)
                .unwrap();
        assert_eq!(config.tracer.capacity, 10);
        assert_eq!(config.tracer.subscriber_buffer, 256);
        assert_eq!(config.logger.min_level, LogLevel::Warn);
        assert_eq!(config.resources.max_handles, 4096);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = KernelConfig::default();
        config.tracer.capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tracer.capacity"));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_validate_rejects_bad_chaos_rate() {
        let config = KernelConfig {
            chaos: ChaosConfig::enabled().with_drop_rate(2.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_file_yields_defaults() {
        let config = KernelConfig::load(None).unwrap();
        assert_eq!(config.streams.high_water_mark, 16);
    }

    #[test]
    fn test_seeded() {
        assert_eq!(KernelConfig::seeded(7).rng_seed, Some(7));
    }
}
