use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fault-injection settings for the global default or one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    pub enabled: bool,
    /// Delay applied by `maybe_delay`, in milliseconds.
    pub latency_ms: u64,
    /// Probability in `[0, 1]` that `should_drop` answers true.
    pub drop_rate: f64,
    /// Probability in `[0, 1]` that `should_disconnect` answers true.
    pub disconnect_rate: f64,
    /// Addresses reported as unreachable by `is_partitioned`.
    pub partition_targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidChaosConfig {
    #[error("{field} must be within [0, 1], got {value}")]
    RateOutOfRange { field: &'static str, value: f64 },
}

impl ChaosConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = rate;
        self
    }

    pub fn with_disconnect_rate(mut self, rate: f64) -> Self {
        self.disconnect_rate = rate;
        self
    }

    pub fn with_partition(mut self, target: impl Into<String>) -> Self {
        self.partition_targets.push(target.into());
        self
    }

    pub fn validate(&self) -> Result<(), InvalidChaosConfig> {
        check_rate("drop_rate", self.drop_rate)?;
        check_rate("disconnect_rate", self.disconnect_rate)
    }
}

fn check_rate(field: &'static str, value: f64) -> Result<(), InvalidChaosConfig> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(InvalidChaosConfig::RateOutOfRange { field, value })
    }
}
