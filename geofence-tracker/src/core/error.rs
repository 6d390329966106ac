/*!
Error taxonomy for the tracker core
*/

use thiserror::Error;

/// Errors surfaced by the tracker core.
///
/// Nothing here is fatal to the process. `InvalidPosition` and
/// `InvalidGeofence` are reported to the caller with no state mutated;
/// `EvaluationSkipped` is logged while the cycle continues for the remaining
/// fences and entities.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A position report failed range validation and was discarded
    #[error("invalid position for entity {entity_id}: {reason}")]
    InvalidPosition { entity_id: String, reason: String },

    /// A geofence definition failed shape validation; the registry is unchanged
    #[error("invalid geofence {id}: {reason}")]
    InvalidGeofence { id: String, reason: String },

    /// A stored geofence could not be evaluated and was skipped for this cycle
    #[error("evaluation skipped for geofence {id}: {reason}")]
    EvaluationSkipped { id: String, reason: String },

    /// Reading a configuration file failed
    #[error("failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Parsing a configuration file failed
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
