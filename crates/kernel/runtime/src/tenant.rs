use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hive_kernel_platform::Environment;
use hive_kernel_types::TenantId;

use crate::caps::Caps;
use crate::signal::SignalController;
use crate::stdio::{Stdio, StdioOptions};

/// Options for [`Kernel::create_tenant`](crate::Kernel::create_tenant).
#[derive(Debug, Clone, Default)]
pub struct TenantOptions {
    /// Explicit id; a fresh UUID is generated when unset.
    pub id: Option<TenantId>,
    pub capabilities: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub stdio: StdioOptions,
}

impl TenantOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<TenantId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn grant(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.push(tag.into());
        self
    }

    pub fn grant_all<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdio(mut self, stdio: StdioOptions) -> Self {
        self.stdio = stdio;
        self
    }
}

/// A tenant record.
///
/// Records are immutable snapshots; `Kernel::regrant` replaces the record
/// rather than editing it. The signal controller is shared between a record
/// and its replacements.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: TenantId,
    pub caps: Caps,
    pub env: Environment,
    pub stdio: Stdio,
    pub signals: Arc<SignalController>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn id(&self) -> &TenantId {
        &self.id
    }
}
