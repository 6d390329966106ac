/*!
Typed in-process publish/subscribe fan-out for position updates and violations
*/

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::core::detection_engine::Violation;
use crate::core::position::PositionReport;

/// Events published by the tracker
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// An entity's latest position changed
    PositionUpdated(PositionReport),
    /// A violation was detected during an evaluation cycle
    ViolationDetected(Violation),
}

/// Handle returned by subscribe, used to detach the subscriber again
pub type SubscriptionId = Uuid;

/// Trait for event subscribers (persistence, notification and dashboard
/// collaborators attach through this seam)
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name of the subscriber
    fn name(&self) -> &'static str;

    /// Handle one published event
    async fn handle_event(
        &mut self,
        event: &TrackerEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Best-effort synchronous fan-out to the currently attached subscribers.
///
/// A failing handler is logged and isolated: it neither prevents delivery to
/// the other handlers nor aborts the producing cycle. There is no replay; a
/// subscriber attached after an event was published will not receive it.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Box<dyn EventSubscriber>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) -> SubscriptionId {
        let id = Uuid::new_v4();
        debug!("attached subscriber {} ({id})", subscriber.name());
        self.subscribers.push((id, subscriber));
        id
    }

    /// Detach a subscriber; returns false when the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every attached subscriber.
    pub async fn publish(&mut self, event: &TrackerEvent) {
        for (id, subscriber) in &mut self.subscribers {
            if let Err(e) = subscriber.handle_event(event).await {
                error!("subscriber {} ({id}) failed: {e}", subscriber.name());
            }
        }
    }
}
