use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use hive_kernel_types::TenantId;
use serde::Serialize;
use serde_json::Value;

/// Local endpoint behind a registered service name.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn call(&self, request: Value) -> Value;
}

/// [`ServiceHandler`] backed by an async closure.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ServiceHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Value> + Send + 'static,
{
    async fn call(&self, request: Value) -> Value {
        (self.f)(request).await
    }
}

/// A directory record: either a local handler or a pointer to another node.
#[derive(Clone, Serialize)]
pub struct ServiceEntry {
    pub name: String,
    #[serde(skip)]
    pub handler: Option<Arc<dyn ServiceHandler>>,
    pub metadata: Value,
    pub owner: Option<TenantId>,
    /// Set for entries created by `register_remote`.
    pub node: Option<String>,
}

impl ServiceEntry {
    pub fn local(name: impl Into<String>, handler: Arc<dyn ServiceHandler>) -> Self {
        Self {
            name: name.into(),
            handler: Some(handler),
            metadata: Value::Null,
            owner: None,
            node: None,
        }
    }

    pub fn remote(name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
            metadata: Value::Null,
            owner: None,
            node: Some(node.into()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_owner(mut self, owner: TenantId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_remote(&self) -> bool {
        self.handler.is_none()
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.name)
            .field("local", &self.handler.is_some())
            .field("metadata", &self.metadata)
            .field("owner", &self.owner)
            .field("node", &self.node)
            .finish()
    }
}

/// Options for [`ServiceRegistry::register`](crate::ServiceRegistry::register).
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub metadata: Value,
    pub owner: Option<TenantId>,
}

impl RegisterOptions {
    pub fn owned_by(owner: TenantId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
