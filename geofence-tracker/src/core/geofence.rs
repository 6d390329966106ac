/*!
Geofence definitions and the in-memory registry they are evaluated from
*/

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::error::TrackerError;
use crate::core::geometry::{haversine_distance, point_in_polygon, Coordinate};

fn default_true() -> bool {
    true
}

/// Shape of a geofence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeofenceShape {
    /// Circle around a center coordinate; containment is boundary-inclusive
    Circle { center: Coordinate, radius_m: f64 },
    /// Ordered vertex list, at least 3 points, not required to be closed
    Polygon { vertices: Vec<Coordinate> },
}

/// A named geographic region with associated rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub id: String,
    pub name: String,
    pub shape: GeofenceShape,
    /// Maximum speed allowed inside the fence in km/h, when set
    pub max_speed_kmh: Option<f64>,
    /// True when entities are expected inside; false makes any presence a violation
    #[serde(default = "default_true")]
    pub authorized: bool,
    /// Inactive fences are kept in the registry but excluded from evaluation
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Geofence {
    /// Validate shape invariants; a failure leaves the registry unchanged.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.id.is_empty() {
            return Err(self.invalid("id must not be empty"));
        }
        match &self.shape {
            GeofenceShape::Circle { center, radius_m } => {
                if !radius_m.is_finite() || *radius_m <= 0.0 {
                    return Err(self.invalid("circle radius must be positive"));
                }
                if !center.in_range() {
                    return Err(self.invalid("circle center out of coordinate range"));
                }
            }
            GeofenceShape::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(self.invalid("polygon requires at least 3 vertices"));
                }
                if vertices.iter().any(|v| !v.in_range()) {
                    return Err(self.invalid("polygon vertex out of coordinate range"));
                }
            }
        }
        if let Some(limit) = self.max_speed_kmh {
            if !limit.is_finite() || limit < 0.0 {
                return Err(self.invalid("max speed must be non-negative"));
            }
        }
        Ok(())
    }

    /// Whether `point` lies inside this fence.
    ///
    /// Returns `EvaluationSkipped` for a malformed shape so one corrupt fence
    /// never aborts the evaluation of the others.
    pub fn contains(&self, point: Coordinate) -> Result<bool, TrackerError> {
        match &self.shape {
            GeofenceShape::Circle { center, radius_m } => {
                if !radius_m.is_finite() || *radius_m <= 0.0 {
                    return Err(self.skipped("circle radius is not positive"));
                }
                Ok(haversine_distance(point, *center) <= *radius_m)
            }
            GeofenceShape::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(self.skipped("polygon has fewer than 3 vertices"));
                }
                Ok(point_in_polygon(point, vertices))
            }
        }
    }

    /// Restricted fences are those that do not authorize entities inside.
    pub fn is_restricted(&self) -> bool {
        !self.authorized
    }

    fn invalid(&self, reason: &str) -> TrackerError {
        TrackerError::InvalidGeofence {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }

    fn skipped(&self, reason: &str) -> TrackerError {
        TrackerError::EvaluationSkipped {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

/// In-memory collection of geofence definitions, keyed by id.
///
/// Administrative writes and evaluation snapshots may happen concurrently:
/// records are validated first and replaced whole behind the lock, so a
/// snapshot reader never observes a partially-updated fence.
#[derive(Debug, Default)]
pub struct GeofenceRegistry {
    fences: RwLock<HashMap<String, Arc<Geofence>>>,
}

impl GeofenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a fence after validating its shape.
    pub async fn upsert(&self, fence: Geofence) -> Result<(), TrackerError> {
        fence.validate()?;
        debug!("registered geofence {} ({})", fence.id, fence.name);
        let mut fences = self.fences.write().await;
        fences.insert(fence.id.clone(), Arc::new(fence));
        Ok(())
    }

    /// Remove a fence; returns false when the id is unknown.
    pub async fn remove(&self, id: &str) -> bool {
        self.fences.write().await.remove(id).is_some()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Geofence>> {
        self.fences.read().await.get(id).cloned()
    }

    /// Snapshot of the active fences for one evaluation cycle.
    ///
    /// Sorted by id so one cycle's violation output is deterministic.
    pub async fn snapshot(&self) -> Vec<Arc<Geofence>> {
        let fences = self.fences.read().await;
        let mut active: Vec<Arc<Geofence>> =
            fences.values().filter(|f| f.active).cloned().collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    pub async fn len(&self) -> usize {
        self.fences.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.fences.read().await.is_empty()
    }
}
