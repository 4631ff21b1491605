//! Event types and the per-competition results hub
//!
//! Every competition gets its own `tokio::broadcast` channel. Publishing never
//! blocks: a slow subscriber only lags (and skips snapshots), it never stalls
//! the publisher or the other subscribers.

mod snapshot_types;

pub use snapshot_types::{CategoryResults, RankedEntry, ResultsSnapshot, RoundResults};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Events pushed to competition subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResultsEvent {
    /// Full recomputed results after a climb, retraction or advancement
    ResultsUpdated { snapshot: ResultsSnapshot },

    /// Climbers were added to the next round's start list
    RoundAdvanced {
        round_id: i64,
        next_round_id: i64,
        advanced_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ResultsEvent {
    /// Get event type as string (used as the SSE event name)
    pub fn event_type(&self) -> &'static str {
        match self {
            ResultsEvent::ResultsUpdated { .. } => "ResultsUpdated",
            ResultsEvent::RoundAdvanced { .. } => "RoundAdvanced",
        }
    }
}

type Channel = broadcast::Sender<Arc<ResultsEvent>>;

/// Fan-out point keyed by competition id
///
/// Channels are created on first subscription and dropped again when the last
/// subscriber of a competition goes away.
pub struct ResultsHub {
    channels: RwLock<HashMap<i64, Channel>>,
    capacity: usize,
}

impl ResultsHub {
    /// Creates a hub whose channels buffer `capacity` events per competition
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        })
    }

    /// Subscribe to all future events of a competition
    ///
    /// Events published before subscription are not received.
    pub fn subscribe(self: &Arc<Self>, competition_id: i64) -> Subscription {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let rx = channels
            .entry(competition_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        let subscription = Subscription {
            id: Uuid::new_v4(),
            competition_id,
            rx: Some(rx),
            hub: Arc::downgrade(self),
        };
        debug!(
            competition_id,
            subscription_id = %subscription.id,
            "Subscriber attached"
        );
        subscription
    }

    /// Hand an event to every subscriber of a competition
    ///
    /// Returns the number of subscribers the event was queued for; zero when
    /// nobody is listening.
    pub fn publish(&self, competition_id: i64, event: ResultsEvent) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = channels.get(&competition_id) else {
            debug!(competition_id, "No subscribers, dropping {}", event.event_type());
            return 0;
        };

        match tx.send(Arc::new(event)) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }

    /// Current number of subscribers of a competition
    pub fn subscriber_count(&self, competition_id: i64) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(&competition_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of competitions with a live channel
    pub fn channel_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every channel so all open subscriptions end
    pub fn close_all(&self) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let closed = channels.len();
        channels.clear();
        debug!(closed, "All result channels closed");
    }

    fn release(&self, competition_id: i64) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = channels.get(&competition_id) {
            if tx.receiver_count() == 0 {
                channels.remove(&competition_id);
                debug!(competition_id, "Last subscriber left, channel removed");
            }
        }
    }
}

/// Receiving side of a competition channel
///
/// Dropping the subscription detaches it from the hub.
pub struct Subscription {
    id: Uuid,
    competition_id: i64,
    rx: Option<broadcast::Receiver<Arc<ResultsEvent>>>,
    hub: Weak<ResultsHub>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn competition_id(&self) -> i64 {
        self.competition_id
    }

    /// Wait for the next event
    ///
    /// Skips over events lost to lagging. Returns `None` once the channel is
    /// closed.
    pub async fn recv(&mut self) -> Option<Arc<ResultsEvent>> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        competition_id = self.competition_id,
                        subscription_id = %self.id,
                        skipped,
                        "Subscriber lagged, skipping missed events"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already queued event without waiting
    pub fn try_recv(&mut self) -> Option<Arc<ResultsEvent>> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Receiver must be gone before the hub counts what is left
        drop(self.rx.take());
        if let Some(hub) = self.hub.upgrade() {
            hub.release(self.competition_id);
        }
        debug!(
            competition_id = self.competition_id,
            subscription_id = %self.id,
            "Subscriber detached"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updated(competition_id: i64) -> ResultsEvent {
        ResultsEvent::ResultsUpdated {
            snapshot: ResultsSnapshot::empty(competition_id),
        }
    }

    #[test]
    fn test_hub_new() {
        let hub = ResultsHub::new(16);
        assert_eq!(hub.capacity(), 16);
        assert_eq!(hub.channel_count(), 0);
        assert_eq!(hub.subscriber_count(1), 0);
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let hub = ResultsHub::new(16);
        assert_eq!(hub.publish(1, updated(1)), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_multiple_subscribers_receive_same_event() {
        let hub = ResultsHub::new(16);
        let mut a = hub.subscribe(1);
        let mut b = hub.subscribe(1);
        assert_eq!(hub.subscriber_count(1), 2);

        assert_eq!(hub.publish(1, updated(1)), 2);

        let ea = a.try_recv().expect("a should receive");
        let eb = b.try_recv().expect("b should receive");
        assert_eq!(ea.event_type(), "ResultsUpdated");
        assert!(Arc::ptr_eq(&ea, &eb), "Both subscribers share one snapshot");
    }

    #[test]
    fn test_competitions_are_isolated() {
        let hub = ResultsHub::new(16);
        let mut one = hub.subscribe(1);
        let mut two = hub.subscribe(2);

        hub.publish(2, updated(2));

        assert!(one.try_recv().is_none());
        match two.try_recv().as_deref() {
            Some(ResultsEvent::ResultsUpdated { snapshot }) => {
                assert_eq!(snapshot.competition_id, 2)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_dropping_last_subscriber_removes_channel() {
        let hub = ResultsHub::new(16);
        let a = hub.subscribe(7);
        let b = hub.subscribe(7);
        assert_eq!(hub.channel_count(), 1);

        drop(a);
        assert_eq!(hub.subscriber_count(7), 1);
        assert_eq!(hub.channel_count(), 1);

        drop(b);
        assert_eq!(hub.channel_count(), 0);
        assert_eq!(hub.publish(7, updated(7)), 0);
    }

    #[test]
    fn test_slow_subscriber_does_not_block_publisher() {
        let hub = ResultsHub::new(2);
        let mut slow = hub.subscribe(1);
        let mut fast = hub.subscribe(1);

        for _ in 0..10 {
            hub.publish(1, updated(1));
            assert!(fast.try_recv().is_some());
        }

        // The slow subscriber skips what it lost and still gets the newest events
        assert!(slow.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_recv_returns_published_event() {
        let hub = ResultsHub::new(4);
        let mut sub = hub.subscribe(3);

        let publisher = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                hub.publish(
                    3,
                    ResultsEvent::RoundAdvanced {
                        round_id: 1,
                        next_round_id: 2,
                        advanced_count: 9,
                        timestamp: chrono::Utc::now(),
                    },
                )
            })
        };

        let event = sub.recv().await.expect("event expected");
        assert_eq!(event.event_type(), "RoundAdvanced");
        assert_eq!(publisher.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_close_all_ends_subscriptions() {
        let hub = ResultsHub::new(4);
        let mut sub = hub.subscribe(1);

        hub.close_all();

        assert_eq!(hub.channel_count(), 0);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_string(&updated(5)).unwrap();
        assert!(json.contains("\"type\":\"ResultsUpdated\""));
        assert!(json.contains("\"competition_id\":5"));
    }
}
