//! Broadcast hub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use parking_lot::RwLock;
use patrol_core::{HubMessage, UpdateEvent};
use patrol_telemetry::Metrics;
use tokio::sync::mpsc::{
    self,
    error::{SendTimeoutError, TrySendError},
};
use tracing::{debug, error, trace, warn};

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::observer::{DeliveryFailure, Frame, ObserverConnection, ObserverId};

/// Outcome of one broadcast pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers the frame was queued to.
    pub delivered: usize,
    /// Observers that failed and were removed from the active set.
    pub dropped: Vec<(ObserverId, DeliveryFailure)>,
}

/// The set of live observers and the fan-out over it.
pub struct BroadcastHub {
    observers: RwLock<HashMap<ObserverId, mpsc::Sender<Frame>>>,
    next_id: AtomicU64,
    config: HubConfig,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Add an observer queue to the active set.
    pub fn register(&self, sink: mpsc::Sender<Frame>) -> HubResult<ObserverId> {
        let mut observers = self.observers.write();
        if observers.len() >= self.config.max_observers {
            return Err(HubError::Full {
                max: self.config.max_observers,
            });
        }

        let id = ObserverId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        observers.insert(id, sink);
        Metrics::observers_set(observers.len());
        debug!(observer = %id, observers = observers.len(), "Observer registered");
        Ok(id)
    }

    /// Remove an observer. Safe to call repeatedly or after it already failed.
    ///
    /// Returns true if the observer was still registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let removed = observers.remove(&id).is_some();
        if removed {
            Metrics::observers_set(observers.len());
            debug!(observer = %id, observers = observers.len(), "Observer unregistered");
        }
        removed
    }

    /// Create a bounded queue, register it, and hand back the receiving side.
    ///
    /// The registration is released when the returned connection is dropped.
    pub fn connect(self: &Arc<Self>) -> HubResult<ObserverConnection> {
        let (tx, rx) = mpsc::channel(self.config.observer_buffer.max(1));
        let id = self.register(tx)?;
        Ok(ObserverConnection::new(Arc::clone(self), id, rx))
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_registered(&self, id: ObserverId) -> bool {
        self.observers.read().contains_key(&id)
    }

    /// Relay an update event to every observer registered right now.
    pub async fn broadcast(&self, event: &UpdateEvent) -> BroadcastReport {
        self.broadcast_message(&HubMessage::LocationUpdate(event.clone()))
            .await
    }

    /// Serialise `message` once and fan it out.
    ///
    /// Observers registered while this call is running may or may not see
    /// the message. Each delivery is bounded by `send_timeout`, and all
    /// deliveries run concurrently, so the whole pass takes at most about
    /// one timeout regardless of how many observers are stalled.
    pub async fn broadcast_message(&self, message: &HubMessage) -> BroadcastReport {
        let started = Instant::now();

        let frame: Frame = match serde_json::to_string(message) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "Failed to serialise hub message");
                return BroadcastReport::default();
            }
        };

        let targets: Vec<(ObserverId, mpsc::Sender<Frame>)> = self
            .observers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        if targets.is_empty() {
            trace!("No observers to broadcast to");
            return BroadcastReport::default();
        }

        let send_timeout = self.config.send_timeout();
        let outcomes = join_all(targets.into_iter().map(|(id, tx)| {
            let frame = Arc::clone(&frame);
            async move { (id, deliver(&tx, frame, send_timeout).await) }
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(failure) => report.dropped.push((id, failure)),
            }
        }

        if !report.dropped.is_empty() {
            let mut observers = self.observers.write();
            for (id, failure) in &report.dropped {
                if observers.remove(id).is_some() {
                    warn!(observer = %id, reason = %failure, "Dropping observer after failed delivery");
                }
                Metrics::delivery_failed(failure.as_str());
            }
            Metrics::observers_set(observers.len());
        }

        let elapsed = started.elapsed();
        Metrics::deliveries(report.delivered);
        Metrics::broadcast_duration(elapsed.as_secs_f64() * 1000.0);
        debug!(
            delivered = report.delivered,
            dropped = report.dropped.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "Broadcast complete"
        );

        report
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Queue one frame, waiting at most `send_timeout` for room.
async fn deliver(
    tx: &mpsc::Sender<Frame>,
    frame: Frame,
    send_timeout: Duration,
) -> Result<(), DeliveryFailure> {
    match tx.try_send(frame) {
        Ok(()) => Ok(()),
        Err(TrySendError::Closed(_)) => Err(DeliveryFailure::Closed),
        Err(TrySendError::Full(frame)) => match tx.send_timeout(frame, send_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Closed(_)) => Err(DeliveryFailure::Closed),
            Err(SendTimeoutError::Timeout(_)) => Err(DeliveryFailure::TimedOut),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use patrol_core::{Coordinate, PatrolId};

    fn event(n: u64) -> UpdateEvent {
        UpdateEvent {
            patrol_id: PatrolId::new(n),
            unit: format!("U{n}"),
            location: Coordinate::new(1.0, 1.0),
            timestamp: Utc.timestamp_opt(1_700_000_000 + n as i64, 0).unwrap(),
            on_track: true,
        }
    }

    fn fast_hub() -> Arc<BroadcastHub> {
        Arc::new(BroadcastHub::new(HubConfig {
            send_timeout_ms: 50,
            observer_buffer: 16,
            max_observers: 8,
            ..HubConfig::default()
        }))
    }

    fn patrol_id_of(frame: &Frame) -> u64 {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        value["patrol_id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_with_no_observers() {
        let hub = fast_hub();
        let report = hub.broadcast(&event(1)).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_observer() {
        let hub = fast_hub();
        let mut a = hub.connect().unwrap();
        let mut b = hub.connect().unwrap();

        let report = hub.broadcast(&event(1)).await;
        assert_eq!(report.delivered, 2);
        assert!(report.dropped.is_empty());

        for conn in [&mut a, &mut b] {
            let frame = conn.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(value["type"], "location_update");
            assert_eq!(value["patrol_id"], 1);
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_broadcast_order() {
        let hub = fast_hub();
        let mut conn = hub.connect().unwrap();

        for n in 1..=5 {
            hub.broadcast(&event(n)).await;
        }

        for n in 1..=5 {
            assert_eq!(patrol_id_of(&conn.recv().await.unwrap()), n);
        }
    }

    #[tokio::test]
    async fn test_unresponsive_observer_is_dropped_without_blocking_others() {
        let hub = fast_hub();
        let mut healthy_a = hub.connect().unwrap();
        let mut healthy_b = hub.connect().unwrap();

        // A stalled observer: capacity one, already full, never drained.
        let (stalled_tx, _stalled_rx) = mpsc::channel::<Frame>(1);
        stalled_tx.try_send(Arc::from("backlog")).unwrap();
        let stalled = hub.register(stalled_tx).unwrap();
        assert_eq!(hub.observer_count(), 3);

        let started = Instant::now();
        let report = hub.broadcast(&event(9)).await;
        let elapsed = started.elapsed();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, vec![(stalled, DeliveryFailure::TimedOut)]);
        assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");

        assert!(!hub.is_registered(stalled));
        assert_eq!(hub.observer_count(), 2);
        assert_eq!(patrol_id_of(&healthy_a.recv().await.unwrap()), 9);
        assert_eq!(patrol_id_of(&healthy_b.recv().await.unwrap()), 9);
    }

    #[tokio::test]
    async fn test_closed_observer_fails_fast() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            send_timeout_ms: 5_000,
            ..HubConfig::default()
        }));
        let (tx, rx) = mpsc::channel::<Frame>(4);
        let id = hub.register(tx).unwrap();
        drop(rx);

        let started = Instant::now();
        let report = hub.broadcast(&event(1)).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(report.dropped, vec![(id, DeliveryFailure::Closed)]);
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_observer_stays_dropped() {
        let hub = fast_hub();
        let (tx, rx) = mpsc::channel::<Frame>(4);
        let id = hub.register(tx).unwrap();
        drop(rx);

        hub.broadcast(&event(1)).await;
        let report = hub.broadcast(&event(2)).await;

        assert!(report.dropped.is_empty());
        assert_eq!(report.delivered, 0);
        assert!(!hub.is_registered(id));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = fast_hub();
        let (tx, _rx) = mpsc::channel::<Frame>(4);
        let id = hub.register(tx).unwrap();

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert!(!hub.unregister(id));
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_connection_unregisters() {
        let hub = fast_hub();
        let conn = hub.connect().unwrap();
        let id = conn.id();
        assert!(hub.is_registered(id));

        drop(conn);
        assert!(!hub.is_registered(id));
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_observer_limit() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            max_observers: 2,
            ..HubConfig::default()
        }));
        let _a = hub.connect().unwrap();
        let b = hub.connect().unwrap();
        assert_eq!(hub.connect().unwrap_err(), HubError::Full { max: 2 });

        drop(b);
        assert!(hub.connect().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_broadcast_and_registration() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            send_timeout_ms: 100,
            observer_buffer: 1024,
            max_observers: 128,
            ..HubConfig::default()
        }));
        let mut steady = hub.connect().unwrap();

        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    for n in 0..50u64 {
                        hub.broadcast(&event(p * 1000 + n)).await;
                    }
                })
            })
            .collect();

        let churn = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let conn = hub.connect().unwrap();
                    tokio::task::yield_now().await;
                    drop(conn);
                }
            })
        };

        for producer in producers {
            producer.await.unwrap();
        }
        churn.await.unwrap();

        // The steady observer saw every event, each producer's in order.
        let mut last_seen = [None::<u64>; 4];
        let mut total = 0;
        while let Some(frame) = steady.try_recv() {
            let id = patrol_id_of(&frame);
            let (producer, n) = ((id / 1000) as usize, id % 1000);
            if let Some(prev) = last_seen[producer] {
                assert!(n > prev, "producer {producer} out of order");
            }
            last_seen[producer] = Some(n);
            total += 1;
        }
        assert_eq!(total, 200);
        assert_eq!(hub.observer_count(), 1);
    }
}
