//! Per-tenant capability sets.
//!
//! A [`Caps`] value is built once from a list of tags and never changes.
//! Widening a tenant's rights means building a new `Caps` and swapping it in.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use hive_kernel_chaos::ChaosEngine;
use hive_kernel_observe::Tracer;
use hive_kernel_platform::{Clock, RandomSource};
use hive_kernel_registry::ServiceRegistry;
use hive_kernel_types::{Capability, WILDCARD};

use crate::error::CapabilityError;
use crate::kernel::Kernel;

/// Shared kernel subsystems a capability can expose.
#[derive(Clone)]
pub struct Subsystems {
    pub clock: Arc<dyn Clock>,
    pub rng: Arc<dyn RandomSource>,
    pub tracer: Arc<Tracer>,
    pub chaos: Arc<ChaosEngine>,
    pub services: Arc<ServiceRegistry>,
}

/// Immutable capability grant.
///
/// Subsystem tags (`clock`, `rng`, `trace`, `chaos`, `ipc`) carry a reference
/// to the kernel's instance; the remaining tags are plain flags.
#[derive(Clone)]
pub struct Caps {
    granted: Vec<Capability>,
    set: BTreeSet<Capability>,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<Arc<dyn RandomSource>>,
    tracer: Option<Arc<Tracer>>,
    chaos: Option<Arc<ChaosEngine>>,
    services: Option<Arc<ServiceRegistry>>,
}

/// Build the caps for `tags` against `kernel`'s subsystems.
///
/// `"*"` grants every capability. Unknown tags are refused.
pub fn build_caps<I, S>(kernel: &Kernel, tags: I) -> Result<Caps, CapabilityError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Caps::from_tags(kernel.subsystems(), tags)
}

/// Fail with `ECAPDENIED` unless `caps` holds `capability`.
pub fn require_cap(caps: &Caps, capability: Capability) -> Result<(), CapabilityError> {
    if caps.has(capability) {
        Ok(())
    } else {
        Err(CapabilityError::Denied(capability))
    }
}

impl Caps {
    pub fn from_tags<I, S>(subsystems: &Subsystems, tags: I) -> Result<Self, CapabilityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut granted = Vec::new();
        let mut set = BTreeSet::new();
        for tag in tags {
            let tag = tag.as_ref();
            let caps: Vec<Capability> = if tag == WILDCARD {
                Capability::ALL.to_vec()
            } else {
                let cap = tag
                    .parse::<Capability>()
                    .map_err(|e| CapabilityError::Unknown(e.0))?;
                vec![cap]
            };
            for cap in caps {
                if set.insert(cap) {
                    granted.push(cap);
                }
            }
        }

        let attach = |cap: Capability| set.contains(&cap);
        Ok(Self {
            clock: attach(Capability::Clock).then(|| subsystems.clock.clone()),
            rng: attach(Capability::Rng).then(|| subsystems.rng.clone()),
            tracer: attach(Capability::Trace).then(|| subsystems.tracer.clone()),
            chaos: attach(Capability::Chaos).then(|| subsystems.chaos.clone()),
            services: attach(Capability::Ipc).then(|| subsystems.services.clone()),
            granted,
            set,
        })
    }

    /// A grant of nothing.
    pub fn none() -> Self {
        Self {
            granted: Vec::new(),
            set: BTreeSet::new(),
            clock: None,
            rng: None,
            tracer: None,
            chaos: None,
            services: None,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.set.contains(&capability)
    }

    /// Granted capabilities in grant order.
    pub fn granted(&self) -> &[Capability] {
        &self.granted
    }

    pub fn granted_tags(&self) -> Vec<&'static str> {
        self.granted.iter().map(|c| c.tag()).collect()
    }

    pub fn require(&self, capability: Capability) -> Result<(), CapabilityError> {
        require_cap(self, capability)
    }

    pub fn require_clock(&self) -> Result<Arc<dyn Clock>, CapabilityError> {
        self.clock.clone().ok_or(CapabilityError::Denied(Capability::Clock))
    }

    pub fn require_rng(&self) -> Result<Arc<dyn RandomSource>, CapabilityError> {
        self.rng.clone().ok_or(CapabilityError::Denied(Capability::Rng))
    }

    pub fn require_tracer(&self) -> Result<Arc<Tracer>, CapabilityError> {
        self.tracer.clone().ok_or(CapabilityError::Denied(Capability::Trace))
    }

    pub fn require_chaos(&self) -> Result<Arc<ChaosEngine>, CapabilityError> {
        self.chaos.clone().ok_or(CapabilityError::Denied(Capability::Chaos))
    }

    pub fn require_services(&self) -> Result<Arc<ServiceRegistry>, CapabilityError> {
        self.services.clone().ok_or(CapabilityError::Denied(Capability::Ipc))
    }
}

impl fmt::Debug for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caps").field("granted", &self.granted_tags()).finish()
    }
}
