//! Event broker fanning parsed journal records out to stream subscribers.
//!
//! The broker wraps a `tokio::sync::broadcast` channel. Publishing is a
//! synchronous, non-blocking send that is safe from any thread, which makes
//! it the handoff point between the filesystem watcher thread and the
//! async serving runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use uuid::Uuid;

use crate::journal::JournalRecord;

/// Default per-subscriber buffer size.
pub const DEFAULT_BROKER_CAPACITY: usize = 1024;

/// Default idle interval before a subscriber is handed a keep-alive.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(30);

/// Result of waiting for the next broker event.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A record published after the subscriber attached.
    Record(Arc<JournalRecord>),
    /// Nothing arrived within the idle interval.
    Idle,
    /// Every publisher is gone.
    Closed,
}

/// Single ordered broadcast point for journal records.
#[derive(Debug, Clone)]
pub struct EventBroker {
    tx: broadcast::Sender<Arc<JournalRecord>>,
    published: Arc<AtomicU64>,
}

impl EventBroker {
    /// Create a broker with the given per-subscriber buffer capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish a record to every currently attached subscriber.
    ///
    /// Never blocks. Returns the number of subscribers the record was queued
    /// for; with no subscribers the record is discarded.
    pub fn publish(&self, record: JournalRecord) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let event = record.event_name().to_string();
        match self.tx.send(Arc::new(record)) {
            Ok(receivers) => {
                tracing::debug!(event = %event, receivers, "Published journal record");
                receivers
            }
            Err(_) => {
                tracing::trace!(event = %event, "No subscribers, record discarded");
                0
            }
        }
    }

    /// Attach a new subscriber. It only sees records published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            id: Uuid::new_v4(),
            rx: self.tx.subscribe(),
        }
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of records published since the broker was created.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new(DEFAULT_BROKER_CAPACITY)
    }
}

/// One subscriber's view of the broker.
///
/// Dropping the subscriber detaches it.
#[derive(Debug)]
pub struct Subscriber {
    id: Uuid,
    rx: broadcast::Receiver<Arc<JournalRecord>>,
}

impl Subscriber {
    /// Unique id of this subscriber, used in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next record, or [`BrokerEvent::Idle`] once `idle` elapses.
    ///
    /// If this subscriber fell behind, the records it missed are skipped and
    /// the wait continues with the oldest record still buffered.
    pub async fn next_event(&mut self, idle: Duration) -> BrokerEvent {
        let deadline = Instant::now() + idle;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return BrokerEvent::Idle,
                Ok(Ok(record)) => return BrokerEvent::Record(record),
                Ok(Err(RecvError::Closed)) => return BrokerEvent::Closed,
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        subscriber = %self.id,
                        skipped,
                        "Subscriber lagging, dropped oldest records"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::parse_line;

    const SHORT: Duration = Duration::from_millis(50);

    fn record(event: &str, n: u64) -> JournalRecord {
        parse_line(format!(r#"{{"event":"{event}","n":{n}}}"#).as_bytes()).unwrap()
    }

    fn expect_record(event: BrokerEvent) -> Arc<JournalRecord> {
        match event {
            BrokerEvent::Record(r) => r,
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers_in_order() {
        let broker = EventBroker::new(16);
        let mut a = broker.subscribe();
        let mut b = broker.subscribe();

        for n in 0..5 {
            assert_eq!(broker.publish(record("Scan", n)), 2);
        }

        for sub in [&mut a, &mut b] {
            for n in 0..5 {
                let r = expect_record(sub.next_event(SHORT).await);
                assert_eq!(r.get("n").unwrap(), n);
            }
            assert!(matches!(sub.next_event(SHORT).await, BrokerEvent::Idle));
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backlog() {
        let broker = EventBroker::new(16);
        let mut early = broker.subscribe();
        broker.publish(record("Location", 0));
        broker.publish(record("Location", 1));

        let mut late = broker.subscribe();
        broker.publish(record("Docked", 2));

        let r = expect_record(late.next_event(SHORT).await);
        assert_eq!(r.event_name(), "Docked");
        assert!(matches!(late.next_event(SHORT).await, BrokerEvent::Idle));

        assert_eq!(expect_record(early.next_event(SHORT).await).event_name(), "Location");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broker = EventBroker::default();
        assert_eq!(broker.publish(record("Music", 0)), 0);
        assert_eq!(broker.published_count(), 1);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_signal() {
        let broker = EventBroker::new(4);
        let mut sub = broker.subscribe();
        assert!(matches!(sub.next_event(SHORT).await, BrokerEvent::Idle));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_isolated() {
        let broker = EventBroker::new(2);
        let mut slow = broker.subscribe();
        let mut fast = broker.subscribe();

        broker.publish(record("A", 0));
        assert_eq!(expect_record(fast.next_event(SHORT).await).get("n").unwrap(), 0);
        broker.publish(record("B", 1));
        assert_eq!(expect_record(fast.next_event(SHORT).await).get("n").unwrap(), 1);
        broker.publish(record("C", 2));
        assert_eq!(expect_record(fast.next_event(SHORT).await).get("n").unwrap(), 2);

        // Slow subscriber lost the oldest record but keeps order
        assert_eq!(expect_record(slow.next_event(SHORT).await).get("n").unwrap(), 1);
        assert_eq!(expect_record(slow.next_event(SHORT).await).get("n").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_closed_when_broker_dropped() {
        let broker = EventBroker::new(4);
        let mut sub = broker.subscribe();
        drop(broker);
        assert!(matches!(sub.next_event(SHORT).await, BrokerEvent::Closed));
    }

    #[tokio::test]
    async fn test_publish_from_other_thread() {
        let broker = EventBroker::new(64);
        let mut sub = broker.subscribe();

        let producer = broker.clone();
        std::thread::spawn(move || {
            for n in 0..20 {
                producer.publish(record("Bounty", n));
            }
        })
        .join()
        .unwrap();

        for n in 0..20 {
            let r = expect_record(sub.next_event(Duration::from_secs(1)).await);
            assert_eq!(r.get("n").unwrap(), n);
        }
    }

    #[test]
    fn test_subscriber_count_tracks_drops() {
        let broker = EventBroker::new(4);
        let a = broker.subscribe();
        let b = broker.subscribe();
        assert_ne!(a.id(), b.id());
        assert_eq!(broker.subscriber_count(), 2);
        drop(a);
        assert_eq!(broker.subscriber_count(), 1);
    }
}
