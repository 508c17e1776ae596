use std::future::Future;

use async_trait::async_trait;

use crate::service::ServiceEntry;

/// Consulted when a lookup misses the local directory.
///
/// Returning `None` passes the name on to the next hook.
#[async_trait]
pub trait LookupHook: Send + Sync {
    async fn resolve(&self, name: &str) -> Option<ServiceEntry>;
}

/// [`LookupHook`] backed by an async closure.
pub struct FnLookupHook<F> {
    f: F,
}

impl<F> FnLookupHook<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> LookupHook for FnLookupHook<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<ServiceEntry>> + Send + 'static,
{
    async fn resolve(&self, name: &str) -> Option<ServiceEntry> {
        (self.f)(name.to_string()).await
    }
}
