/*!
Position reports delivered by the ingestion boundary
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::TrackerError;
use crate::core::geometry::Coordinate;

/// A single positional report for a tracked entity.
///
/// Immutable once constructed; each report supersedes the previous one for
/// the same entity. Only the latest report per entity is retained in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionReport {
    /// Identifier of the reporting entity (vehicle)
    pub entity_id: String,
    /// Driver currently assigned to the entity, when known
    pub driver_id: Option<String>,
    /// Reported position
    pub coordinate: Coordinate,
    /// Altitude above sea level in meters, when the fix provides one
    pub altitude_m: Option<f64>,
    /// Ground speed in km/h
    pub speed_kmh: f64,
    /// Heading in degrees, 0 inclusive to 360 exclusive
    pub heading_deg: f64,
    /// Horizontal accuracy radius of the fix in meters
    pub accuracy_m: f64,
    /// Time the fix was taken
    pub timestamp: DateTime<Utc>,
    /// Number of satellites used for the fix, when reported
    pub satellites: Option<u8>,
}

impl PositionReport {
    /// Construct a report with the required fields; optional fields stay
    /// unset and accuracy defaults to a nominal GPS fix radius.
    pub fn new(
        entity_id: impl Into<String>,
        coordinate: Coordinate,
        speed_kmh: f64,
        heading_deg: f64,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            driver_id: None,
            coordinate,
            altitude_m: None,
            speed_kmh,
            heading_deg,
            accuracy_m: 10.0,
            timestamp: Utc::now(),
            satellites: None,
        }
    }

    /// Validate ranges before the report may touch any tracker state.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !self.coordinate.in_range() {
            return Err(self.invalid(format!(
                "coordinate out of range: {:.4}, {:.4}",
                self.coordinate.latitude, self.coordinate.longitude
            )));
        }
        if !self.speed_kmh.is_finite() || self.speed_kmh < 0.0 {
            return Err(self.invalid(format!("speed must be non-negative: {}", self.speed_kmh)));
        }
        if !self.heading_deg.is_finite() || !(0.0..360.0).contains(&self.heading_deg) {
            return Err(self.invalid(format!(
                "heading must be in [0, 360): {}",
                self.heading_deg
            )));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> TrackerError {
        TrackerError::InvalidPosition {
            entity_id: self.entity_id.clone(),
            reason,
        }
    }
}
