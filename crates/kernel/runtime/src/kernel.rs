//! Kernel facade - owns every subsystem and the tenant lifecycle

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hive_kernel_chaos::ChaosEngine;
use hive_kernel_observe::{Logger, LoggerOptions, ModuleLogger, Tracer, TracerOptions};
use hive_kernel_platform::{Clock, EntropyRng, RandomSource, SeededRng, SystemClock};
use hive_kernel_registry::ServiceRegistry;
use hive_kernel_resources::{ResourceEntry, ResourceTable};
use hive_kernel_stream::{create_pipe, PipeEnd};
use hive_kernel_types::{Handle, TenantId};
use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, info};

use crate::caps::{build_caps, Subsystems};
use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::signal::{Signal, SignalController};
use crate::stdio::{HostStdio, Stdio, StdioOptions};
use crate::tenant::{Tenant, TenantOptions};

/// Trace kinds recorded by the kernel itself.
pub const TRACE_TENANT_CREATED: &str = "tenant.created";
pub const TRACE_TENANT_REGRANTED: &str = "tenant.regranted";
pub const TRACE_TENANT_DESTROYED: &str = "tenant.destroyed";

const LOG_MODULE: &str = "kernel";

/// What `destroy_tenant` released.
#[derive(Debug, Clone)]
pub struct TenantTeardown {
    pub tenant: Tenant,
    /// Handles dropped from the resource table, in allocation order.
    pub released_handles: Vec<Handle>,
    pub released_services: Vec<String>,
}

/// Builder for [`Kernel`] with injectable time and randomness.
#[derive(Default)]
pub struct KernelBuilder {
    config: KernelConfig,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<Arc<dyn RandomSource>>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides `config.rng_seed`.
    pub fn rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn build(self) -> Result<Kernel> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let rng: Arc<dyn RandomSource> = match (self.rng, config.rng_seed) {
            (Some(rng), _) => rng,
            (None, Some(seed)) => Arc::new(SeededRng::new(seed)),
            (None, None) => Arc::new(EntropyRng),
        };

        let tracer = Arc::new(Tracer::with_options(
            clock.clone(),
            TracerOptions {
                capacity: config.tracer.capacity,
                subscriber_buffer: config.tracer.subscriber_buffer,
            },
        ));
        let logger = Logger::with_options(
            clock.clone(),
            Some(tracer.clone()),
            LoggerOptions {
                capacity: config.logger.capacity,
                min_level: config.logger.min_level,
                subscriber_buffer: config.tracer.subscriber_buffer,
            },
        );
        let chaos = Arc::new(ChaosEngine::new(clock.clone(), rng.clone(), config.chaos.clone()));

        info!(
            max_handles = config.resources.max_handles,
            seeded = config.rng_seed.is_some(),
            "Kernel started"
        );

        Ok(Kernel {
            resources: Arc::new(ResourceTable::new(config.resources.max_handles)),
            subsystems: Subsystems {
                clock,
                rng,
                tracer,
                chaos,
                services: Arc::new(ServiceRegistry::new()),
            },
            log: logger.scoped(LOG_MODULE),
            logger,
            signals: Arc::new(SignalController::new(LOG_MODULE)),
            tenants: RwLock::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
            config,
        })
    }
}

/// The in-process microkernel.
///
/// One Clock and one RandomSource are threaded through every subsystem, so
/// swapping them via [`KernelBuilder`] makes the whole kernel deterministic.
pub struct Kernel {
    config: KernelConfig,
    subsystems: Subsystems,
    resources: Arc<ResourceTable>,
    logger: Logger,
    log: ModuleLogger,
    signals: Arc<SignalController>,
    tenants: RwLock<BTreeMap<TenantId, Tenant>>,
    closed: AtomicBool,
}

impl Kernel {
    /// Kernel with default configuration, host clock and OS entropy.
    pub fn new() -> Result<Self> {
        KernelBuilder::new().build()
    }

    pub fn with_config(config: KernelConfig) -> Result<Self> {
        KernelBuilder::new().config(config).build()
    }

    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn subsystems(&self) -> &Subsystems {
        &self.subsystems
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.subsystems.clock
    }

    pub fn rng(&self) -> &Arc<dyn RandomSource> {
        &self.subsystems.rng
    }

    pub fn resources(&self) -> &Arc<ResourceTable> {
        &self.resources
    }

    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.subsystems.tracer
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn chaos(&self) -> &Arc<ChaosEngine> {
        &self.subsystems.chaos
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.subsystems.services
    }

    /// Kernel-wide signals, distinct from each tenant's own controller.
    pub fn signals(&self) -> &Arc<SignalController> {
        &self.signals
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(KernelError::Closed);
        }
        Ok(())
    }

    /// Register a tenant with its caps, environment, stdio and signals.
    pub fn create_tenant(&self, options: TenantOptions) -> Result<Tenant> {
        self.ensure_open()?;
        let caps = build_caps(self, &options.capabilities)?;

        let tenant = {
            let mut tenants = self.tenants.write();
            // `close` flips the flag under this lock, so a tenant inserted
            // here is always in its teardown snapshot.
            self.ensure_open()?;
            let id = match options.id {
                Some(id) if tenants.contains_key(&id) => return Err(KernelError::TenantExists(id)),
                Some(id) => id,
                None => loop {
                    let id = self.fresh_tenant_id();
                    if !tenants.contains_key(&id) {
                        break id;
                    }
                },
            };

            let tenant = Tenant {
                caps,
                env: options.env.into_iter().collect(),
                stdio: Stdio::from_options(options.stdio),
                signals: Arc::new(SignalController::new(id.as_str())),
                created_at: self.subsystems.clock.now_wall(),
                id,
            };
            tenants.insert(tenant.id.clone(), tenant.clone());
            tenant
        };

        self.subsystems.tracer.emit_with(
            TRACE_TENANT_CREATED,
            Some(&tenant.id),
            json!({ "capabilities": tenant.caps.granted_tags() }),
        );
        self.log.info(format!("tenant {} created", tenant.id));
        Ok(tenant)
    }

    /// Tenant id from 16 kernel-RNG bytes, formatted as a v4 UUID.
    fn fresh_tenant_id(&self) -> TenantId {
        let mut bytes = [0u8; 16];
        self.subsystems.rng.fill_bytes(&mut bytes);
        TenantId::new(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
    }

    pub fn tenant(&self, id: &TenantId) -> Option<Tenant> {
        self.tenants.read().get(id).cloned()
    }

    /// Live tenant ids, sorted.
    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.read().keys().cloned().collect()
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.read().len()
    }

    /// Replace a tenant's caps with a fresh grant of `tags`.
    ///
    /// The returned record is new; records handed out earlier keep their
    /// old caps.
    pub fn regrant<I, S>(&self, id: &TenantId, tags: I) -> Result<Tenant>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_open()?;
        let caps = build_caps(self, tags)?;

        let tenant = {
            let mut tenants = self.tenants.write();
            self.ensure_open()?;
            let current = tenants
                .get(id)
                .ok_or_else(|| KernelError::TenantNotFound(id.clone()))?;
            let replacement = Tenant {
                caps,
                ..current.clone()
            };
            tenants.insert(id.clone(), replacement.clone());
            replacement
        };

        self.subsystems.tracer.emit_with(
            TRACE_TENANT_REGRANTED,
            Some(id),
            json!({ "capabilities": tenant.caps.granted_tags() }),
        );
        debug!(tenant = %id, "Tenant capabilities regranted");
        Ok(tenant)
    }

    /// Remove a tenant and release everything it owns.
    ///
    /// Raises `SIGTERM` on the tenant's controller, drops its resource table
    /// entries and unregisters its services. A second call for the same id
    /// fails with `TenantNotFound`.
    pub fn destroy_tenant(&self, id: &TenantId) -> Result<TenantTeardown> {
        let tenant = self
            .tenants
            .write()
            .remove(id)
            .ok_or_else(|| KernelError::TenantNotFound(id.clone()))?;

        tenant.signals.raise(Signal::Term);
        let released: Vec<ResourceEntry> = self.resources.drop_owned_by(id);
        let released_services = self.subsystems.services.unregister_owned_by(id);
        let released_handles: Vec<Handle> = released.iter().map(ResourceEntry::handle).collect();

        self.subsystems.tracer.emit_with(
            TRACE_TENANT_DESTROYED,
            Some(id),
            json!({
                "handles": released_handles.iter().map(Handle::to_string).collect::<Vec<_>>(),
                "services": released_services,
            }),
        );
        self.log.info(format!(
            "tenant {id} destroyed, released {} handles and {} services",
            released_handles.len(),
            released_services.len()
        ));

        Ok(TenantTeardown {
            tenant,
            released_handles,
            released_services,
        })
    }

    /// Pipe with the configured high-water mark.
    pub fn pipe(&self) -> (PipeEnd, PipeEnd) {
        create_pipe(self.config.streams.high_water_mark)
    }

    /// Piped stdio with the configured high-water mark.
    pub fn piped_stdio(&self) -> (StdioOptions, HostStdio) {
        Stdio::piped(self.config.streams.high_water_mark)
    }

    /// Full teardown: kernel `SIGTERM`, every tenant destroyed, every
    /// subsystem cleared. Idempotent.
    pub fn close(&self) {
        {
            let _tenants = self.tenants.write();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        self.signals.raise(Signal::Term);

        for id in self.tenant_ids() {
            if let Err(e) = self.destroy_tenant(&id) {
                debug!(tenant = %id, error = %e, "Tenant vanished during close");
            }
        }

        self.resources.clear();
        self.subsystems.tracer.clear();
        self.logger.clear();
        self.subsystems.services.clear();
        self.subsystems.chaos.reset();
        info!("Kernel closed");
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("tenants", &self.tenant_count())
            .field("resources", &self.resources.size())
            .field("services", &self.subsystems.services.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
