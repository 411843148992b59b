//! Live telemetry broadcaster
//!
//! Fans each persisted batch out to every connected subscriber over a
//! bounded `tokio::sync::broadcast` channel. Sending never waits on a
//! receiver: a slow subscriber lags and is told so by its own connection
//! task, while everyone else (and the ingestion pipeline) carries on.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use super::events::{LiveEvent, WsMessage};
use crate::types::TelemetrySample;

/// Event broadcaster for WebSocket subscribers
pub struct LiveBroadcaster {
    tx: broadcast::Sender<WsMessage>,
    sequence_counter: AtomicU64,
    client_counter: AtomicU64,
    subscribers: Mutex<HashSet<u64>>,
}

impl LiveBroadcaster {
    /// Create a new broadcaster; `capacity` bounds how far a subscriber may lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sequence_counter: AtomicU64::new(0),
            client_counter: AtomicU64::new(0),
            subscribers: Mutex::new(HashSet::new()),
        }
    }

    /// Push a batch to every currently connected subscriber
    ///
    /// Returns how many receivers the message was queued for. Subscribers
    /// that join later never see this batch.
    pub fn broadcast(&self, batch: &[TelemetrySample]) -> usize {
        let seq = self.sequence_counter.fetch_add(1, Ordering::SeqCst);
        let msg = WsMessage {
            event: LiveEvent::LiveUpdate {
                samples: batch.to_vec(),
            },
            sequence_id: seq,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        // Err only means no receivers are connected
        self.tx.send(msg).unwrap_or(0)
    }

    /// Register a new subscriber and hand back its id and receiver
    pub fn on_subscriber_join(&self) -> (u64, broadcast::Receiver<WsMessage>) {
        let client_id = self.client_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let rx = self.tx.subscribe();
        let connected = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(client_id);
            subscribers.len()
        };
        info!(client_id, connected, "Subscriber connected");
        (client_id, rx)
    }

    /// Forget a subscriber; its receiver should already be dropped
    pub fn on_subscriber_leave(&self, client_id: u64) {
        let connected = {
            let mut subscribers = self.subscribers.lock();
            subscribers.remove(&client_id);
            subscribers.len()
        };
        info!(client_id, connected, "Subscriber disconnected");
    }

    /// Number of subscribers currently tracked
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Sequence ID the next broadcast will carry
    pub fn current_sequence_id(&self) -> u64 {
        self.sequence_counter.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewSample;
    use chrono::{TimeZone, Utc};

    fn batch(n: u64) -> Vec<TelemetrySample> {
        (1..=n)
            .map(|i| {
                NewSample {
                    speed: 100.0,
                    throttle: 10.0,
                    brake: 0.0,
                    gear: 3,
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, i as u32).unwrap(),
                    driver_id: 1,
                    race_id: 1,
                }
                .into_sample(i)
            })
            .collect()
    }

    #[test]
    fn test_broadcaster_sequence_increment() {
        let broadcaster = LiveBroadcaster::new(16);
        assert_eq!(broadcaster.current_sequence_id(), 0);

        // No subscribers is not an error
        assert_eq!(broadcaster.broadcast(&batch(2)), 0);
        assert_eq!(broadcaster.current_sequence_id(), 1);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_batch() {
        let broadcaster = LiveBroadcaster::new(16);
        let (_, mut rx1) = broadcaster.on_subscriber_join();
        let (_, mut rx2) = broadcaster.on_subscriber_join();

        assert_eq!(broadcaster.broadcast(&batch(3)), 2);

        for rx in [&mut rx1, &mut rx2] {
            let msg = rx.recv().await.unwrap();
            let LiveEvent::LiveUpdate { samples } = msg.event;
            assert_eq!(samples.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_batches() {
        let broadcaster = LiveBroadcaster::new(16);
        broadcaster.broadcast(&batch(1));

        let (_, mut rx) = broadcaster.on_subscriber_join();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        broadcaster.broadcast(&batch(2));
        assert_eq!(rx.recv().await.unwrap().sequence_id, 1);
    }

    #[test]
    fn test_slow_subscriber_does_not_block_others() {
        let broadcaster = LiveBroadcaster::new(2);
        let (_, mut slow) = broadcaster.on_subscriber_join();
        let (_, mut fast) = broadcaster.on_subscriber_join();

        for _ in 0..5 {
            broadcaster.broadcast(&batch(1));
            assert!(fast.try_recv().is_ok());
        }

        assert!(matches!(
            slow.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(3))
        ));
    }

    #[test]
    fn test_join_and_leave_tracking() {
        let broadcaster = LiveBroadcaster::new(4);
        let (a, rx_a) = broadcaster.on_subscriber_join();
        let (b, _rx_b) = broadcaster.on_subscriber_join();
        assert_ne!(a, b);
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(rx_a);
        broadcaster.on_subscriber_leave(a);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }
}
