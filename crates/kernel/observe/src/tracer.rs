use std::sync::Arc;

use chrono::{DateTime, Utc};
use hive_kernel_platform::Clock;
use hive_kernel_types::TenantId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hub::{FanOut, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
use crate::ring::RingBuffer;

pub const DEFAULT_TRACE_CAPACITY: usize = 1000;

/// A stamped trace record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Monotonic per tracer, starting at 1.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantId>,
    #[serde(default)]
    pub data: Value,
}

/// An event before the tracer stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub kind: String,
    pub tenant: Option<TenantId>,
    pub data: Value,
}

impl TraceRecord {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            tenant: None,
            data: Value::Null,
        }
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerOptions {
    pub capacity: usize,
    pub subscriber_buffer: usize,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TRACE_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

struct TracerState {
    last_id: u64,
    ring: RingBuffer<TraceEvent>,
}

/// Ring-buffered event store with live subscriptions.
///
/// Stamping, storing and fan-out happen under one lock, so every subscriber
/// observes events in the same order as `snapshot()`.
pub struct Tracer {
    clock: Arc<dyn Clock>,
    state: Mutex<TracerState>,
    hub: FanOut<TraceEvent>,
}

impl Tracer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, TracerOptions::default())
    }

    pub fn with_options(clock: Arc<dyn Clock>, options: TracerOptions) -> Self {
        Self {
            clock,
            state: Mutex::new(TracerState {
                last_id: 0,
                ring: RingBuffer::new(options.capacity),
            }),
            hub: FanOut::new(options.subscriber_buffer),
        }
    }

    /// Stamp, store and publish `record`.
    pub fn emit(&self, record: TraceRecord) -> TraceEvent {
        let mut state = self.state.lock();
        state.last_id += 1;
        let event = TraceEvent {
            id: state.last_id,
            timestamp: self.clock.now_wall(),
            kind: record.kind,
            tenant: record.tenant,
            data: record.data,
        };
        state.ring.push(event.clone());
        self.hub.publish(&event);
        event
    }

    pub fn emit_with(
        &self,
        kind: impl Into<String>,
        tenant: Option<&TenantId>,
        data: Value,
    ) -> TraceEvent {
        self.emit(TraceRecord {
            kind: kind.into(),
            tenant: tenant.cloned(),
            data,
        })
    }

    /// Events emitted after this call. No history is replayed.
    pub fn events(&self) -> Subscription<TraceEvent> {
        // Taken under the state lock so no emit can interleave with attach.
        let _state = self.state.lock();
        self.hub.subscribe()
    }

    pub fn events_of_kind(&self, kind: impl Into<String>) -> Subscription<TraceEvent> {
        let kind = kind.into();
        let _state = self.state.lock();
        self.hub.subscribe_filtered(move |e: &TraceEvent| e.kind == kind)
    }

    /// Buffered events, oldest first.
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.state.lock().ring.to_vec()
    }

    pub fn snapshot_kind(&self, kind: &str) -> Vec<TraceEvent> {
        self.state
            .lock()
            .ring
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Drop buffered events and detach subscribers. Ids keep counting up.
    pub fn clear(&self) {
        self.state.lock().ring.clear();
        self.hub.close_all();
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
