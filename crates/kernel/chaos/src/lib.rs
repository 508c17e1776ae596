//! Chaos engine: configurable latency, drop, disconnect and partition faults.
//!
//! All checks are no-ops while the effective config is disabled. Time comes
//! from the kernel's [`Clock`](hive_kernel_platform::Clock) and randomness
//! from its [`RandomSource`](hive_kernel_platform::RandomSource).

pub mod config;
pub mod engine;
pub mod error;

pub use config::{ChaosConfig, InvalidChaosConfig};
pub use engine::{ChaosEngine, ChaosStats};
pub use error::ChaosError;
