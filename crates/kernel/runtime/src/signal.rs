//! Named signals backed by re-arming cancellation tokens.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hive_kernel_platform::{AbortController, AbortSignal};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SignalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "SIGINT")]
    Int,
    #[serde(rename = "SIGTERM")]
    Term,
    #[serde(rename = "SIGHUP")]
    Hup,
    #[serde(rename = "SIGUSR1")]
    Usr1,
    #[serde(rename = "SIGUSR2")]
    Usr2,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::Int,
        Signal::Term,
        Signal::Hup,
        Signal::Usr1,
        Signal::Usr2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Int => "SIGINT",
            Signal::Term => "SIGTERM",
            Signal::Hup => "SIGHUP",
            Signal::Usr1 => "SIGUSR1",
            Signal::Usr2 => "SIGUSR2",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL
            .iter()
            .copied()
            .find(|sig| sig.as_str() == s)
            .ok_or_else(|| SignalError::UnknownSignal(s.to_string()))
    }
}

/// Identifies a handler registered with [`SignalController::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type SignalHandler = Arc<dyn Fn(Signal) + Send + Sync>;

#[derive(Default)]
struct SignalSlot {
    controller: AbortController,
    handlers: Vec<(HandlerId, SignalHandler)>,
    raised: u64,
}

/// Per-scope signal dispatcher.
///
/// Each signal owns a cancellation token. [`raise`](Self::raise) fires the
/// current token, arms a fresh one for later waiters, then runs the handlers
/// registered for that signal.
pub struct SignalController {
    scope: String,
    slots: Mutex<HashMap<Signal, SignalSlot>>,
    next_handler: Mutex<u64>,
}

impl SignalController {
    /// `scope` labels the controller in logs (`kernel`, a tenant id, ...).
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            slots: Mutex::new(HashMap::new()),
            next_handler: Mutex::new(0),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Raise `signal`. Returns the number of handlers run.
    pub fn raise(&self, signal: Signal) -> usize {
        let handlers: Vec<SignalHandler> = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(signal).or_default();
            let fired = std::mem::take(&mut slot.controller);
            fired.abort(signal.as_str());
            slot.raised += 1;
            slot.handlers.iter().map(|(_, h)| h.clone()).collect()
        };

        debug!(scope = %self.scope, %signal, handlers = handlers.len(), "Signal raised");
        for handler in &handlers {
            handler(signal);
        }
        handlers.len()
    }

    pub fn on<F>(&self, signal: Signal, handler: F) -> HandlerId
    where
        F: Fn(Signal) + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.next_handler.lock();
            *next += 1;
            HandlerId(*next)
        };
        self.slots
            .lock()
            .entry(signal)
            .or_default()
            .handlers
            .push((id, Arc::new(handler)));
        id
    }

    pub fn off(&self, id: HandlerId) -> bool {
        let mut slots = self.slots.lock();
        for slot in slots.values_mut() {
            let before = slot.handlers.len();
            slot.handlers.retain(|(hid, _)| *hid != id);
            if slot.handlers.len() != before {
                return true;
            }
        }
        false
    }

    /// Token that fires on the next raise of `signal`.
    pub fn abort_signal(&self, signal: Signal) -> AbortSignal {
        self.slots.lock().entry(signal).or_default().controller.signal()
    }

    /// Token that fires on the next `SIGINT` or `SIGTERM`.
    pub fn shutdown_signal(&self) -> AbortSignal {
        let int = self.abort_signal(Signal::Int);
        let term = self.abort_signal(Signal::Term);
        AbortSignal::any([&int, &term])
    }

    pub fn raised_count(&self, signal: Signal) -> u64 {
        self.slots.lock().get(&signal).map_or(0, |s| s.raised)
    }

    pub fn handler_count(&self, signal: Signal) -> usize {
        self.slots.lock().get(&signal).map_or(0, |s| s.handlers.len())
    }
}

impl fmt::Debug for SignalController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalController").field("scope", &self.scope).finish()
    }
}
