//! Fan-out of emitted records to independent bounded subscriber channels.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default per-subscriber channel depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Identifies one live subscription on a [`FanOut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct Subscriber<T> {
    id: SubscriptionId,
    /// None = everything
    filter: Option<Filter<T>>,
    sender: mpsc::Sender<T>,
}

impl<T> Subscriber<T> {
    fn matches(&self, item: &T) -> bool {
        self.filter.as_ref().map_or(true, |f| f(item))
    }
}

/// Pushes each published record to every matching subscriber.
///
/// Subscribers see only records published after they subscribe. A
/// subscriber that falls `buffer` records behind misses records until it
/// catches up; a subscriber whose [`Subscription`] was dropped is removed on
/// the next publish.
pub struct FanOut<T> {
    buffer: usize,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber<T>>>,
}

impl<T: Clone + Send + 'static> FanOut<T> {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        self.attach(None)
    }

    pub fn subscribe_filtered<F>(&self, filter: F) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.attach(Some(Arc::new(filter)))
    }

    fn attach(&self, filter: Option<Filter<T>>) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push(Subscriber { id, filter, sender });
        debug!(subscription_id = id.0, "New subscription registered");
        Subscription { id, receiver }
    }

    /// Deliver `item` to every matching subscriber.
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, item: &T) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;
        let mut closed = 0;

        subscribers.retain(|sub| {
            if !sub.matches(item) {
                return !sub.sender.is_closed();
            }
            match sub.sender.try_send(item.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscription_id = sub.id.0, "Subscriber channel full, dropping record");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed += 1;
                    false
                }
            }
        });

        if closed > 0 {
            debug!(removed = closed, "Cleaned up closed subscriptions");
        }
        delivered
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    /// Live subscribers; dropped subscriptions are not counted.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| !s.sender.is_closed())
            .count()
    }

    /// Detach every subscriber. Their streams end once drained.
    pub fn close_all(&self) {
        self.subscribers.lock().clear();
    }
}

/// Live, lazily-produced sequence of records from a [`FanOut`].
///
/// Ends (`None`) once the publisher detaches it.
pub struct Subscription<T> {
    id: SubscriptionId,
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub async fn next(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Next record if one is already buffered.
    pub fn try_next(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = FanOut::new(8);
        let mut sub = hub.subscribe();

        assert_eq!(hub.publish(&1u32), 1);
        assert_eq!(sub.next().await, Some(1));
    }

    #[tokio::test]
    async fn late_subscriber_sees_no_history() {
        let hub = FanOut::new(8);
        hub.publish(&1u32);
        let mut sub = hub.subscribe();
        hub.publish(&2u32);

        assert_eq!(sub.next().await, Some(2));
        assert_eq!(sub.try_next(), None);
    }

    #[tokio::test]
    async fn filter_limits_delivery() {
        let hub = FanOut::new(8);
        let mut evens = hub.subscribe_filtered(|n: &u32| n % 2 == 0);

        assert_eq!(hub.publish(&1), 0);
        assert_eq!(hub.publish(&2), 1);
        assert_eq!(evens.next().await, Some(2));
    }

    #[test]
    fn full_subscriber_misses_records() {
        let hub = FanOut::new(2);
        let mut sub = hub.subscribe();

        assert_eq!(hub.publish(&1u32), 1);
        assert_eq!(hub.publish(&2u32), 1);
        assert_eq!(hub.publish(&3u32), 0);

        assert_eq!(sub.try_next(), Some(1));
        assert_eq!(sub.try_next(), Some(2));
        assert_eq!(sub.try_next(), None);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let hub = FanOut::new(4);
        let sub = hub.subscribe();
        let _kept = hub.subscribe();
        drop(sub);

        assert_eq!(hub.subscriber_count(), 1);
        hub.publish(&0u8);
        assert_eq!(hub.subscribers.lock().len(), 1);
    }

    #[tokio::test]
    async fn close_all_ends_streams() {
        let hub = FanOut::new(4);
        let sub = hub.subscribe();
        hub.publish(&"a");
        hub.close_all();

        let drained: Vec<_> = sub.collect().await;
        assert_eq!(drained, vec!["a"]);
    }

    #[test]
    fn unsubscribe_by_id() {
        let hub: FanOut<u8> = FanOut::new(4);
        let sub = hub.subscribe();
        assert!(hub.unsubscribe(sub.id()));
        assert!(!hub.unsubscribe(sub.id()));
    }
}
