/*!
Real-time geofence violation detection for vehicle fleets.

Evaluates a continuous stream of position reports against a registry of
circular and polygonal geofences, tracking per-entity membership to classify
entry, exit, speed-limit and unauthorized-area violations, and fans the
results out to in-process subscribers.
*/

pub mod core;

pub use crate::core::config::{DetectionConfig, SyntheticConfig, TrackerConfig};
pub use crate::core::detection_engine::{
    classify_severity, DetectionEngine, Severity, Violation, ViolationKind,
};
pub use crate::core::error::TrackerError;
pub use crate::core::event_system::{EventBus, EventSubscriber, SubscriptionId, TrackerEvent};
pub use crate::core::feed::{ChannelFeed, ReportSource, SyntheticFeed};
pub use crate::core::geofence::{Geofence, GeofenceRegistry, GeofenceShape};
pub use crate::core::geometry::{
    haversine_distance, point_in_polygon, project_destination, Coordinate, EARTH_RADIUS_M,
};
pub use crate::core::position::PositionReport;
pub use crate::core::state_manager::{MembershipTracker, PositionStore};
pub use crate::core::tracker::{GeofenceTracker, StopHandle, TrackerStats};
