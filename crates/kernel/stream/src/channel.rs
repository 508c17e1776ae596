//! Entangled message ports.
//!
//! A message posted on one port is delivered synchronously, in post order,
//! to every listener registered on the other port. Closing either port
//! closes the channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::StreamError;

/// Identifies a listener registered with [`Port::on_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

type Listener<M> = Arc<dyn Fn(&M) + Send + Sync>;

struct Inbox<M> {
    listeners: Mutex<Vec<(ListenerId, Listener<M>)>>,
    /// Serializes deliveries so concurrent posts never interleave.
    /// Reentrant so a listener may post back through the channel.
    delivery: ReentrantMutex<()>,
}

impl<M> Inbox<M> {
    fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            delivery: ReentrantMutex::new(()),
        }
    }
}

struct ChannelShared {
    closed: AtomicBool,
    next_listener: AtomicU64,
}

/// One side of a channel created by [`create_channel`].
pub struct Port<M> {
    local: Arc<Inbox<M>>,
    peer: Arc<Inbox<M>>,
    shared: Arc<ChannelShared>,
}

impl<M> Clone for Port<M> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            peer: self.peer.clone(),
            shared: self.shared.clone(),
        }
    }
}

/// Two entangled ports.
pub fn create_channel<M: Send + 'static>() -> (Port<M>, Port<M>) {
    let a = Arc::new(Inbox::new());
    let b = Arc::new(Inbox::new());
    let shared = Arc::new(ChannelShared {
        closed: AtomicBool::new(false),
        next_listener: AtomicU64::new(1),
    });
    (
        Port {
            local: a.clone(),
            peer: b.clone(),
            shared: shared.clone(),
        },
        Port {
            local: b,
            peer: a,
            shared,
        },
    )
}

impl<M: Send + 'static> Port<M> {
    /// Deliver `msg` to every listener on the peer port.
    ///
    /// Returns the number of listeners reached.
    pub fn post(&self, msg: M) -> Result<usize, StreamError> {
        if self.is_closed() {
            return Err(StreamError::PortClosed);
        }

        let _order = self.peer.delivery.lock();
        let listeners: Vec<Listener<M>> = self
            .peer
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in &listeners {
            listener(&msg);
        }
        Ok(listeners.len())
    }

    /// Register a listener for messages posted by the peer.
    pub fn on_message<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.local.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.local.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.local.listeners.lock().len()
    }

    /// Close the channel. Both ports stop delivering; listeners are dropped.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = self.local.listeners.lock().drain(..).count()
            + self.peer.listeners.lock().drain(..).count();
        debug!(dropped_listeners = dropped, "Channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<M: Clone + Send + 'static> Port<M> {
    /// Receive the peer's messages on an unbounded queue instead of a callback.
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.on_message(move |msg: &M| {
            let _ = tx.send(msg.clone());
        });
        (id, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<M: Clone + Send + 'static>(
    ) -> (Arc<Mutex<Vec<M>>>, impl Fn(&M) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |m: &M| sink.lock().push(m.clone()))
    }

    #[test]
    fn delivers_in_post_order() {
        let (a, b) = create_channel::<u32>();
        let (seen, listener) = recorder();
        b.on_message(listener);

        for i in 0..5 {
            a.post(i).unwrap();
        }
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn fans_out_to_every_listener() {
        let (a, b) = create_channel::<&'static str>();
        let (first, l1) = recorder();
        let (second, l2) = recorder();
        b.on_message(l1);
        b.on_message(l2);

        assert_eq!(a.post("hi").unwrap(), 2);
        assert_eq!(*first.lock(), vec!["hi"]);
        assert_eq!(*second.lock(), vec!["hi"]);
    }

    #[test]
    fn delivery_is_directional() {
        let (a, b) = create_channel::<u8>();
        let (on_a, la) = recorder();
        let (on_b, lb) = recorder();
        a.on_message(la);
        b.on_message(lb);

        a.post(1).unwrap();
        b.post(2).unwrap();
        assert_eq!(*on_a.lock(), vec![2]);
        assert_eq!(*on_b.lock(), vec![1]);
    }

    #[test]
    fn off_removes_listener() {
        let (a, b) = create_channel::<u8>();
        let (seen, listener) = recorder();
        let id = b.on_message(listener);
        assert_eq!(b.listener_count(), 1);

        assert!(b.off(id));
        assert!(!b.off(id));
        assert_eq!(a.post(1).unwrap(), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn post_after_close_fails() {
        let (a, b) = create_channel::<u8>();
        b.on_message(|_| {});
        a.close();
        a.close();

        assert!(a.is_closed());
        assert!(b.is_closed());
        assert_eq!(b.listener_count(), 0);
        let err = a.post(1).unwrap_err();
        assert_eq!(err, StreamError::PortClosed);
        assert_eq!(err.code(), hive_kernel_types::ErrorCode::StreamClosed);
        assert!(b.post(2).is_err());
    }

    #[test]
    fn listener_may_reply_through_channel() {
        let (a, b) = create_channel::<u32>();
        let (replies, listener) = recorder();
        a.on_message(listener);

        let reply = b.clone();
        b.on_message(move |n: &u32| {
            let _ = reply.post(n * 10);
        });

        a.post(4).unwrap();
        assert_eq!(*replies.lock(), vec![40]);
    }

    #[tokio::test]
    async fn subscribe_yields_messages() {
        let (a, b) = create_channel::<String>();
        let (_id, mut rx) = b.subscribe();

        a.post("one".into()).unwrap();
        a.post("two".into()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await.as_deref(), Some("two"));
    }
}
