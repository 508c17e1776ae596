//! One-shot cancellation tokens.

use std::sync::Arc;
use std::time::Duration;

use futures::future::select_all;
use hive_kernel_types::ErrorCode;
use thiserror::Error;
use tokio::sync::watch;

use crate::clock::Clock;

/// A suspending call was cancelled through its [`AbortSignal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("interrupted: {reason}")]
pub struct Interrupted {
    pub reason: String,
}

impl Interrupted {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Signal
    }
}

/// Owning side of a cancellation token. Fires at most once.
#[derive(Debug, Clone)]
pub struct AbortController {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// A token observing this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            sources: vec![self.tx.subscribe()],
        }
    }

    /// Fire the token. Returns `false` if it had already fired; the first
    /// reason is kept.
    pub fn abort(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn is_aborted(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of one or more [`AbortController`]s.
///
/// A composite signal (see [`AbortSignal::any`]) fires as soon as any of its
/// sources fires.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    sources: Vec<watch::Receiver<Option<String>>>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn any<'a>(signals: impl IntoIterator<Item = &'a AbortSignal>) -> Self {
        Self {
            sources: signals
                .into_iter()
                .flat_map(|s| s.sources.iter().cloned())
                .collect(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.sources.iter().any(|rx| rx.borrow().is_some())
    }

    /// Reason of the first fired source, if any has fired.
    pub fn reason(&self) -> Option<String> {
        self.sources.iter().find_map(|rx| rx.borrow().clone())
    }

    /// Fail fast if the signal has already fired.
    pub fn check(&self) -> Result<(), Interrupted> {
        match self.reason() {
            Some(reason) => Err(Interrupted { reason }),
            None => Ok(()),
        }
    }

    /// Resolves with the abort reason once any source fires.
    pub async fn cancelled(&self) -> String {
        if let Some(reason) = self.reason() {
            return reason;
        }
        if self.sources.is_empty() {
            return std::future::pending().await;
        }

        let waits = self.sources.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                let fired = rx
                    .wait_for(|r| r.is_some())
                    .await
                    .map(|r| (*r).clone().unwrap_or_default());
                match fired {
                    Ok(reason) => reason,
                    // Controller dropped without firing: this source never fires.
                    Err(_) => std::future::pending::<String>().await,
                }
            })
        });

        let (reason, _, _) = select_all(waits).await;
        reason
    }
}

/// Sleep on `clock` unless `signal` fires first.
pub async fn sleep_or_abort(
    clock: &dyn Clock,
    duration: Duration,
    signal: &AbortSignal,
) -> Result<(), Interrupted> {
    signal.check()?;
    tokio::select! {
        _ = clock.sleep(duration) => Ok(()),
        reason = signal.cancelled() => Err(Interrupted { reason }),
    }
}
