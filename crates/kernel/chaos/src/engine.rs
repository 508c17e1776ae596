use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hive_kernel_platform::{sleep_or_abort, AbortSignal, Clock, RandomSource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChaosConfig;
use crate::error::ChaosError;

/// Counters of faults injected since construction or the last `reset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosStats {
    pub delays: u64,
    pub drops: u64,
    pub disconnects: u64,
    pub partitions: u64,
}

#[derive(Default)]
struct Counters {
    delays: AtomicU64,
    drops: AtomicU64,
    disconnects: AtomicU64,
    partitions: AtomicU64,
}

struct ChaosState {
    global: ChaosConfig,
    scopes: HashMap<String, ChaosConfig>,
}

/// Fault injector shared by every kernel subsystem.
///
/// Each scope either has its own [`ChaosConfig`] or falls back to the global
/// one; a scope override replaces the global settings wholesale. Random
/// decisions draw four bytes from the injected [`RandomSource`] per check,
/// so a seeded source reproduces the same fault sequence.
pub struct ChaosEngine {
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    initial: ChaosConfig,
    state: RwLock<ChaosState>,
    counters: Counters,
}

impl ChaosEngine {
    pub fn new(clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>, global: ChaosConfig) -> Self {
        Self {
            clock,
            rng,
            initial: global.clone(),
            state: RwLock::new(ChaosState {
                global,
                scopes: HashMap::new(),
            }),
            counters: Counters::default(),
        }
    }

    pub fn global(&self) -> ChaosConfig {
        self.state.read().global.clone()
    }

    pub fn set_global(&self, config: ChaosConfig) {
        debug!(enabled = config.enabled, "Chaos global config updated");
        self.state.write().global = config;
    }

    pub fn set_scope(&self, scope: impl Into<String>, config: ChaosConfig) {
        let scope = scope.into();
        debug!(scope = %scope, enabled = config.enabled, "Chaos scope override set");
        self.state.write().scopes.insert(scope, config);
    }

    pub fn clear_scope(&self, scope: &str) -> bool {
        self.state.write().scopes.remove(scope).is_some()
    }

    /// Effective config: the scope override if one exists, else the global.
    pub fn config_for(&self, scope: Option<&str>) -> ChaosConfig {
        let state = self.state.read();
        scope
            .and_then(|s| state.scopes.get(s))
            .unwrap_or(&state.global)
            .clone()
    }

    /// Sleep for the configured latency. Returns the delay applied.
    pub async fn maybe_delay(&self, scope: Option<&str>) -> Duration {
        let Some(delay) = self.pending_delay(scope) else {
            return Duration::ZERO;
        };
        self.clock.sleep(delay).await;
        delay
    }

    /// Like [`maybe_delay`](Self::maybe_delay), but gives up when `signal` fires.
    pub async fn maybe_delay_or_abort(
        &self,
        scope: Option<&str>,
        signal: &AbortSignal,
    ) -> Result<Duration, ChaosError> {
        let Some(delay) = self.pending_delay(scope) else {
            signal.check()?;
            return Ok(Duration::ZERO);
        };
        sleep_or_abort(self.clock.as_ref(), delay, signal).await?;
        Ok(delay)
    }

    fn pending_delay(&self, scope: Option<&str>) -> Option<Duration> {
        let config = self.config_for(scope);
        if !config.enabled || config.latency_ms == 0 {
            return None;
        }
        self.counters.delays.fetch_add(1, Ordering::Relaxed);
        debug!(scope = ?scope, latency_ms = config.latency_ms, "Injecting chaos latency");
        Some(Duration::from_millis(config.latency_ms))
    }

    pub fn should_drop(&self, scope: Option<&str>) -> bool {
        let config = self.config_for(scope);
        let hit = self.draw(&config, config.drop_rate);
        if hit {
            self.counters.drops.fetch_add(1, Ordering::Relaxed);
            debug!(scope = ?scope, "Chaos drop injected");
        }
        hit
    }

    pub fn should_disconnect(&self, scope: Option<&str>) -> bool {
        let config = self.config_for(scope);
        let hit = self.draw(&config, config.disconnect_rate);
        if hit {
            self.counters.disconnects.fetch_add(1, Ordering::Relaxed);
            debug!(scope = ?scope, "Chaos disconnect injected");
        }
        hit
    }

    /// Bernoulli draw. Consumes randomness whenever chaos is enabled, whatever
    /// the rate, so the draw sequence depends only on the call sequence.
    fn draw(&self, config: &ChaosConfig, rate: f64) -> bool {
        if !config.enabled {
            return false;
        }
        self.rng.next_unit() < rate
    }

    pub fn is_partitioned(&self, addr: &str, scope: Option<&str>) -> bool {
        let config = self.config_for(scope);
        let hit = config.enabled && config.partition_targets.iter().any(|t| t == addr);
        if hit {
            self.counters.partitions.fetch_add(1, Ordering::Relaxed);
            debug!(scope = ?scope, addr, "Chaos partition hit");
        }
        hit
    }

    pub fn stats(&self) -> ChaosStats {
        ChaosStats {
            delays: self.counters.delays.load(Ordering::Relaxed),
            drops: self.counters.drops.load(Ordering::Relaxed),
            disconnects: self.counters.disconnects.load(Ordering::Relaxed),
            partitions: self.counters.partitions.load(Ordering::Relaxed),
        }
    }

    pub fn scope_count(&self) -> usize {
        self.state.read().scopes.len()
    }

    /// Drop scope overrides, restore the construction-time global config and
    /// zero the counters.
    pub fn reset(&self) {
        {
            let mut state = self.state.write();
            state.scopes.clear();
            state.global = self.initial.clone();
        }
        self.counters.delays.store(0, Ordering::Relaxed);
        self.counters.drops.store(0, Ordering::Relaxed);
        self.counters.disconnects.store(0, Ordering::Relaxed);
        self.counters.partitions.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for ChaosEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosEngine")
            .field("global", &self.global())
            .field("scopes", &self.scope_count())
            .field("stats", &self.stats())
            .finish()
    }
}
