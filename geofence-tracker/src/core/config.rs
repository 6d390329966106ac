/*!
Configuration management for the geofence tracker
*/

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::detection_engine::ViolationKind;
use crate::core::error::TrackerError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detection behavior settings
    pub detection: DetectionConfig,
    /// Synthetic feed settings
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Kinds of violations to detect
    pub violation_kinds: Vec<ViolationKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of simulated vehicles
    pub entity_count: usize,
    /// Tick interval in milliseconds
    pub interval_ms: u64,
    /// Latitude of the fleet's starting area
    pub start_latitude: f64,
    /// Longitude of the fleet's starting area
    pub start_longitude: f64,
    /// Radius in meters over which the fleet is initially scattered
    pub scatter_m: f64,
    /// Initial speed of each vehicle in km/h
    pub initial_speed_kmh: f64,
    /// Speed perturbation step per tick in km/h; each tick applies up to half of it
    pub speed_step_kmh: f64,
    /// Maximum heading perturbation per tick in degrees
    pub heading_step_deg: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            violation_kinds: vec![
                ViolationKind::Entry,
                ViolationKind::Exit,
                ViolationKind::SpeedLimit,
                ViolationKind::UnauthorizedArea,
            ],
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            entity_count: 5,
            interval_ms: 1000,
            start_latitude: 40.7128,
            start_longitude: -74.0060,
            scatter_m: 2000.0,
            initial_speed_kmh: 40.0,
            speed_step_kmh: 10.0,
            heading_step_deg: 30.0,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a TOML file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }
}
