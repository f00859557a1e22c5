//! Priority-ordered fan-out of events to subscribers.
//!
//! Every subscriber owns its own queue. [`Bus::publish`] places the event in
//! each queue, or hands it to a scheduling callback for subscribers that live
//! on another execution context. Transient subscribers receive exactly one
//! event and are then removed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::trace;
use unpi_frame::Priority;

use crate::envelope::Prioritized;
use crate::queue::{lock, PriorityQueue};

/// Identifies one subscription on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Schedule<T> = Arc<dyn Fn(Priority, T) + Send + Sync>;

enum Target<T> {
    Queue(Arc<PriorityQueue<T>>),
    Scheduled(Schedule<T>),
    #[cfg(feature = "async")]
    Channel(tokio::sync::mpsc::UnboundedSender<T>),
}

impl<T> Clone for Target<T> {
    fn clone(&self) -> Self {
        match self {
            Target::Queue(queue) => Target::Queue(Arc::clone(queue)),
            Target::Scheduled(schedule) => Target::Scheduled(Arc::clone(schedule)),
            #[cfg(feature = "async")]
            Target::Channel(tx) => Target::Channel(tx.clone()),
        }
    }
}

struct Registration<T> {
    id: SubscriptionId,
    transient: bool,
    target: Target<T>,
}

struct Inner<T> {
    subscribers: Mutex<Vec<Registration<T>>>,
    next_id: AtomicU64,
}

impl<T> Inner<T> {
    fn add(&self, transient: bool, target: Target<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).push(Registration {
            id,
            transient,
            target,
        });
        id
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|registration| registration.id != id);
        subscribers.len() != before
    }
}

/// Thread-safe publish/subscribe hub.
pub struct Bus<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Bus<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }
}

impl<T: Prioritized + Clone + Send + 'static> Bus<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Transient subscribers are removed in the same step that selects them,
    /// so each one sees exactly one event even under concurrent publishes.
    pub fn publish(&self, event: T) {
        let priority = event.priority();
        let targets: Vec<Target<T>> = {
            let mut subscribers = lock(&self.inner.subscribers);
            let targets = subscribers.iter().map(|r| r.target.clone()).collect();
            subscribers.retain(|registration| !registration.transient);
            targets
        };
        trace!(subscribers = targets.len(), ?priority, "publishing event");

        for target in targets {
            match target {
                Target::Queue(queue) => queue.push(priority, event.clone()),
                Target::Scheduled(schedule) => schedule(priority, event.clone()),
                #[cfg(feature = "async")]
                Target::Channel(tx) => {
                    // A closed receiver just means the consumer went away.
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    /// Subscribe to every event until the subscriber is dropped or removed.
    pub fn subscribe(&self) -> Subscriber<T> {
        self.queue_subscriber(false)
    }

    /// Subscribe to the next event only.
    pub fn subscribe_transient(&self) -> Subscriber<T> {
        self.queue_subscriber(true)
    }

    /// Subscribe a consumer running on another execution context.
    ///
    /// `schedule` is called on the publishing thread, in publish order, and
    /// should hand the event over to the consumer's own context.
    pub fn subscribe_scheduled<F>(&self, transient: bool, schedule: F) -> SubscriptionId
    where
        F: Fn(Priority, T) + Send + Sync + 'static,
    {
        self.inner.add(transient, Target::Scheduled(Arc::new(schedule)))
    }

    /// Subscribe a consumer living on a tokio runtime.
    #[cfg(feature = "async")]
    pub fn subscribe_async(&self) -> (SubscriptionId, tokio::sync::mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (self.inner.add(false, Target::Channel(tx)), rx)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// Wait up to `timeout` for the next published event.
    pub fn recv(&self, timeout: Duration) -> Option<T> {
        self.subscribe_transient().pend(true, Some(timeout))
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    fn queue_subscriber(&self, transient: bool) -> Subscriber<T> {
        let queue = Arc::new(PriorityQueue::new());
        let id = self.inner.add(transient, Target::Queue(Arc::clone(&queue)));
        Subscriber {
            id,
            transient,
            queue,
            bus: Arc::downgrade(&self.inner),
        }
    }
}

/// Receiving end of a queue subscription.
///
/// Dropping the subscriber removes it from the bus.
pub struct Subscriber<T> {
    id: SubscriptionId,
    transient: bool,
    queue: Arc<PriorityQueue<T>>,
    bus: Weak<Inner<T>>,
}

impl<T> Subscriber<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Take the next event, most urgent first.
    ///
    /// With `block` unset this returns immediately. Otherwise it waits up to
    /// `timeout`, or indefinitely when `timeout` is `None`. Returns `None`
    /// when no event arrived.
    pub fn pend(&self, block: bool, timeout: Option<Duration>) -> Option<T> {
        if block {
            self.queue.pop(timeout)
        } else {
            self.queue.try_pop()
        }
    }

    /// Events waiting in this subscriber's queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Event(&'static str, Priority);

    impl Prioritized for Event {
        fn priority(&self) -> Priority {
            self.1
        }
    }

    const SYNC: Event = Event("sync", Priority::Urgent);
    const ASYNC: Event = Event("async", Priority::Normal);

    #[test]
    fn sync_events_are_drained_first_in_either_order() {
        for order in [[ASYNC, SYNC], [SYNC, ASYNC]] {
            let bus = Bus::new();
            let sub = bus.subscribe();
            for event in order {
                bus.publish(event);
            }
            assert_eq!(sub.pend(false, None), Some(SYNC));
            assert_eq!(sub.pend(false, None), Some(ASYNC));
        }
    }

    #[test]
    fn transient_subscriber_sees_exactly_one_event() {
        let bus = Bus::new();
        let persistent = bus.subscribe();
        let transient = bus.subscribe_transient();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(ASYNC);
        bus.publish(SYNC);

        assert_eq!(transient.pending(), 1);
        assert_eq!(transient.pend(false, None), Some(ASYNC));
        assert_eq!(transient.pend(true, Some(Duration::from_millis(10))), None);
        assert_eq!(persistent.pending(), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn pend_times_out_without_error() {
        let bus: Bus<Event> = Bus::new();
        let sub = bus.subscribe();
        assert_eq!(sub.pend(true, Some(Duration::from_millis(20))), None);
    }

    #[test]
    fn dropping_or_unsubscribing_removes_subscription() {
        let bus: Bus<Event> = Bus::new();
        let sub = bus.subscribe();
        let id = bus.subscribe_scheduled(false, |_, _| {});
        assert_eq!(bus.subscriber_count(), 2);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn scheduled_hand_off_preserves_publish_order() {
        let bus = Bus::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        bus.subscribe_scheduled(false, move |priority, event: Event| {
            tx.send((priority, event.0)).unwrap();
        });
        bus.publish(ASYNC);
        bus.publish(SYNC);
        bus.publish(Event("later", Priority::Normal));
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                (Priority::Normal, "async"),
                (Priority::Urgent, "sync"),
                (Priority::Normal, "later"),
            ]
        );
    }

    #[test]
    fn recv_waits_for_next_event() {
        let bus = Bus::new();
        let publisher = bus.clone();
        let handle = thread::spawn(move || {
            while publisher.subscriber_count() == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            publisher.publish(SYNC);
        });
        assert_eq!(bus.recv(Duration::from_secs(2)), Some(SYNC));
        handle.join().unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn concurrent_subscribe_and_publish() {
        let bus = Bus::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let bus = bus.clone();
            let delivered = Arc::clone(&delivered);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let sub = bus.subscribe_transient();
                    bus.publish(ASYNC);
                    if sub.pend(false, None).is_some() {
                        delivered.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(delivered.load(Ordering::Relaxed), 200);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_subscriber_receives_events() {
        let bus = Bus::new();
        let (_id, mut rx) = bus.subscribe_async();
        let publisher = bus.clone();
        std::thread::spawn(move || publisher.publish(SYNC))
            .join()
            .unwrap();
        assert_eq!(rx.recv().await, Some(SYNC));
    }
}
