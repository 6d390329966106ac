/*!
Main async coordinator driving the position stream through detection and fan-out
*/

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use crate::core::config::TrackerConfig;
use crate::core::detection_engine::DetectionEngine;
use crate::core::error::TrackerError;
use crate::core::event_system::{EventBus, TrackerEvent};
use crate::core::feed::ReportSource;
use crate::core::geofence::GeofenceRegistry;
use crate::core::position::PositionReport;
use crate::core::state_manager::{MembershipTracker, PositionStore};

/// Statistics about the tracker's operation
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    pub reports_processed: u64,
    pub reports_rejected: u64,
    pub violations_detected: u64,
}

/// Handle for stopping a running tracker from another task.
///
/// Stopping is idempotent: a second call, or a call before the loop starts,
/// is a no-op beyond keeping the loop stopped.
#[derive(Clone)]
pub struct StopHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        // send_replace updates the value even when no loop is subscribed yet.
        self.shutdown.send_replace(true);
    }
}

/// Main tracker that owns per-entity state and coordinates all components.
///
/// Per-entity state (membership sets, latest positions) is only ever mutated
/// by the driving loop processing that entity's reports. Administrative
/// geofence changes go through the shared registry and become visible at the
/// next snapshot; subscribers attach through the shared event bus.
pub struct GeofenceTracker {
    engine: DetectionEngine,
    registry: Arc<GeofenceRegistry>,
    membership: MembershipTracker,
    positions: Arc<RwLock<PositionStore>>,
    bus: Arc<RwLock<EventBus>>,
    stats: TrackerStats,
    shutdown: Arc<watch::Sender<bool>>,
}

impl GeofenceTracker {
    pub fn new(
        config: &TrackerConfig,
        registry: Arc<GeofenceRegistry>,
        bus: Arc<RwLock<EventBus>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            engine: DetectionEngine::new(&config.detection),
            registry,
            membership: MembershipTracker::new(),
            positions: Arc::new(RwLock::new(PositionStore::new())),
            bus,
            stats: TrackerStats::default(),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Handle that can stop the driving loop from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Shared view of the latest positions (query boundary)
    pub fn positions(&self) -> Arc<RwLock<PositionStore>> {
        self.positions.clone()
    }

    pub async fn current_position(&self, entity_id: &str) -> Option<PositionReport> {
        self.positions.read().await.current_position(entity_id)
    }

    pub async fn all_current_positions(&self) -> Vec<PositionReport> {
        self.positions.read().await.all_current_positions()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats.clone()
    }

    /// Ingest one report: validate, store the latest position, detect
    /// violations against the current registry snapshot and publish.
    ///
    /// An invalid report is rejected with no state mutated.
    pub async fn ingest(&mut self, report: PositionReport) -> Result<(), TrackerError> {
        if let Err(e) = report.validate() {
            self.stats.reports_rejected += 1;
            return Err(e);
        }

        self.positions.write().await.update(report.clone());
        let snapshot = self.registry.snapshot().await;
        let violations = self
            .engine
            .process_report(&report, &snapshot, &mut self.membership);

        self.stats.reports_processed += 1;
        self.stats.violations_detected += violations.len() as u64;

        let mut bus = self.bus.write().await;
        bus.publish(&TrackerEvent::PositionUpdated(report)).await;
        for violation in violations {
            bus.publish(&TrackerEvent::ViolationDetected(violation)).await;
        }
        Ok(())
    }

    /// Drive the tracker from a report source until the source ends or the
    /// loop is stopped.
    ///
    /// The loop survives any single-report failure; rejected reports are
    /// logged and the remaining reports of the batch still get processed.
    pub async fn run(&mut self, source: Box<dyn ReportSource>) -> Result<(), TrackerError> {
        let source_name = source.name();
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            info!("tracker already stopped, not starting {source_name} feed");
            return Ok(());
        }

        info!("starting geofence tracker on {source_name} feed");
        let mut batches = source.start();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                batch = batches.next() => {
                    match batch {
                        Some(reports) => {
                            for report in reports {
                                if let Err(e) = self.ingest(report).await {
                                    warn!("discarded report: {e}");
                                }
                            }
                        }
                        None => {
                            info!("{source_name} feed drained");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            "geofence tracker stopped after {} reports ({} violations)",
            self.stats.reports_processed, self.stats.violations_detected
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_system::EventSubscriber;
    use crate::core::feed::ChannelFeed;
    use crate::core::geofence::{Geofence, GeofenceShape};
    use crate::core::geometry::Coordinate;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const CENTER: Coordinate = Coordinate {
        latitude: 40.7128,
        longitude: -74.0060,
    };

    struct CollectingSubscriber {
        events: Arc<Mutex<Vec<TrackerEvent>>>,
    }

    #[async_trait]
    impl EventSubscriber for CollectingSubscriber {
        fn name(&self) -> &'static str {
            "collecting"
        }

        async fn handle_event(
            &mut self,
            event: &TrackerEvent,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    async fn registry_with_depot() -> Arc<GeofenceRegistry> {
        let registry = Arc::new(GeofenceRegistry::new());
        registry
            .upsert(Geofence {
                id: "depot".to_string(),
                name: "Depot".to_string(),
                shape: GeofenceShape::Circle {
                    center: CENTER,
                    radius_m: 1000.0,
                },
                max_speed_kmh: None,
                authorized: true,
                active: true,
            })
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_ingest_rejects_invalid_report_without_state_change() {
        let registry = registry_with_depot().await;
        let bus = Arc::new(RwLock::new(EventBus::new()));
        let mut tracker = GeofenceTracker::new(&TrackerConfig::default(), registry, bus);

        let bad = PositionReport::new("v1", Coordinate::new(99.0, 0.0), 10.0, 0.0);
        assert!(matches!(
            tracker.ingest(bad).await,
            Err(TrackerError::InvalidPosition { .. })
        ));
        assert!(tracker.current_position("v1").await.is_none());
        assert_eq!(tracker.stats().reports_rejected, 1);
        assert_eq!(tracker.stats().reports_processed, 0);
    }

    #[tokio::test]
    async fn test_ingest_stores_position_and_publishes_violations() {
        let registry = registry_with_depot().await;
        let events = Arc::new(Mutex::new(Vec::new()));
        let bus = Arc::new(RwLock::new(EventBus::new()));
        bus.write().await.subscribe(Box::new(CollectingSubscriber {
            events: events.clone(),
        }));
        let mut tracker = GeofenceTracker::new(&TrackerConfig::default(), registry, bus);

        tracker
            .ingest(PositionReport::new("v1", CENTER, 10.0, 0.0))
            .await
            .unwrap();

        assert!(tracker.current_position("v1").await.is_some());
        assert_eq!(tracker.all_current_positions().await.len(), 1);
        assert_eq!(tracker.stats().violations_detected, 1);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TrackerEvent::PositionUpdated(_)));
        match &events[1] {
            TrackerEvent::ViolationDetected(v) => assert_eq!(v.geofence_id, "depot"),
            other => panic!("expected violation event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_processes_feed_until_drained() {
        let registry = registry_with_depot().await;
        let events = Arc::new(Mutex::new(Vec::new()));
        let bus = Arc::new(RwLock::new(EventBus::new()));
        bus.write().await.subscribe(Box::new(CollectingSubscriber {
            events: events.clone(),
        }));
        let mut tracker =
            GeofenceTracker::new(&TrackerConfig::default(), registry, bus);
        let positions = tracker.positions();

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(async move {
            tracker.run(Box::new(ChannelFeed::new(rx))).await.unwrap();
            tracker
        });

        tx.send(PositionReport::new("v1", CENTER, 10.0, 0.0))
            .await
            .unwrap();
        tx.send(PositionReport::new("v2", Coordinate::new(10.0, 10.0), 10.0, 0.0))
            .await
            .unwrap();
        drop(tx);

        let tracker = task.await.unwrap();
        assert_eq!(tracker.stats().reports_processed, 2);
        assert_eq!(positions.read().await.tracked_entities(), 2);

        let events = events.lock().unwrap();
        let violations = events
            .iter()
            .filter(|e| matches!(e, TrackerEvent::ViolationDetected(_)))
            .count();
        assert_eq!(violations, 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_ends_open_feed() {
        let registry = registry_with_depot().await;
        let bus = Arc::new(RwLock::new(EventBus::new()));
        let mut tracker = GeofenceTracker::new(&TrackerConfig::default(), registry, bus);
        let stop = tracker.stop_handle();

        // Channel stays open: only stop() can end the loop.
        let (tx, rx) = mpsc::channel::<PositionReport>(8);
        let task = tokio::spawn(async move { tracker.run(Box::new(ChannelFeed::new(rx))).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.stop();
        stop.stop();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop must stop promptly")
            .unwrap()
            .unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn test_run_after_stop_returns_immediately() {
        let registry = registry_with_depot().await;
        let bus = Arc::new(RwLock::new(EventBus::new()));
        let mut tracker = GeofenceTracker::new(&TrackerConfig::default(), registry, bus);

        tracker.stop_handle().stop();
        let (_tx, rx) = mpsc::channel::<PositionReport>(1);
        tracker.run(Box::new(ChannelFeed::new(rx))).await.unwrap();
        assert_eq!(tracker.stats().reports_processed, 0);
    }

    #[tokio::test]
    async fn test_registry_mutation_visible_on_next_report() {
        let registry = Arc::new(GeofenceRegistry::new());
        let bus = Arc::new(RwLock::new(EventBus::new()));
        let mut tracker =
            GeofenceTracker::new(&TrackerConfig::default(), registry.clone(), bus);

        // No fences yet: report produces nothing.
        tracker
            .ingest(PositionReport::new("v1", CENTER, 10.0, 0.0))
            .await
            .unwrap();
        assert_eq!(tracker.stats().violations_detected, 0);

        // Admin adds a fence; the very next report picks it up.
        registry
            .upsert(Geofence {
                id: "late".to_string(),
                name: "Late Fence".to_string(),
                shape: GeofenceShape::Circle {
                    center: CENTER,
                    radius_m: 500.0,
                },
                max_speed_kmh: None,
                authorized: true,
                active: true,
            })
            .await
            .unwrap();
        tracker
            .ingest(PositionReport::new("v1", CENTER, 10.0, 0.0))
            .await
            .unwrap();
        assert_eq!(tracker.stats().violations_detected, 1);
    }
}
