/*!
Per-entity tracker state: geofence membership sets and latest positions
*/

use std::collections::{HashMap, HashSet};

use crate::core::position::PositionReport;

/// Which geofences each entity is currently inside.
///
/// Pure state container: the membership diff that detects entry and exit
/// transitions is computed by the detection engine, which keeps the diff
/// unit-testable independent of classification rules. State for an entity is
/// created lazily on its first report.
#[derive(Debug, Default)]
pub struct MembershipTracker {
    memberships: HashMap<String, HashSet<String>>,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current membership set for an entity; empty when the entity is unknown.
    pub fn current_set(&self, entity_id: &str) -> HashSet<String> {
        self.memberships.get(entity_id).cloned().unwrap_or_default()
    }

    /// Replace an entity's membership set wholesale.
    pub fn replace(&mut self, entity_id: &str, next: HashSet<String>) {
        self.memberships.insert(entity_id.to_string(), next);
    }

    /// Drop all membership state for an entity that left the fleet.
    pub fn forget(&mut self, entity_id: &str) -> bool {
        self.memberships.remove(entity_id).is_some()
    }

    pub fn entity_count(&self) -> usize {
        self.memberships.len()
    }
}

/// Latest report per entity.
///
/// No append-only log is kept: each update fully supersedes the previous
/// report for that entity. History is served by an external durable store.
#[derive(Debug, Default)]
pub struct PositionStore {
    latest: HashMap<String, PositionReport>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: PositionReport) {
        self.latest.insert(report.entity_id.clone(), report);
    }

    pub fn current_position(&self, entity_id: &str) -> Option<PositionReport> {
        self.latest.get(entity_id).cloned()
    }

    /// All latest positions, sorted by entity id for stable output.
    pub fn all_current_positions(&self) -> Vec<PositionReport> {
        let mut positions: Vec<PositionReport> = self.latest.values().cloned().collect();
        positions.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        positions
    }

    pub fn tracked_entities(&self) -> usize {
        self.latest.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Coordinate;

    #[test]
    fn test_unknown_entity_has_empty_set() {
        let tracker = MembershipTracker::new();
        assert!(tracker.current_set("ghost").is_empty());
        assert_eq!(tracker.entity_count(), 0);
    }

    #[test]
    fn test_replace_and_forget() {
        let mut tracker = MembershipTracker::new();
        tracker.replace("v1", HashSet::from(["depot".to_string()]));
        assert!(tracker.current_set("v1").contains("depot"));

        tracker.replace("v1", HashSet::new());
        assert!(tracker.current_set("v1").is_empty());
        assert_eq!(tracker.entity_count(), 1);

        assert!(tracker.forget("v1"));
        assert!(!tracker.forget("v1"));
        assert_eq!(tracker.entity_count(), 0);
    }

    #[test]
    fn test_latest_position_supersedes_previous() {
        let mut store = PositionStore::new();
        let first = PositionReport::new("v1", Coordinate::new(40.0, -74.0), 30.0, 0.0);
        let second = PositionReport::new("v1", Coordinate::new(41.0, -74.0), 50.0, 0.0);
        store.update(first);
        store.update(second);

        assert_eq!(store.tracked_entities(), 1);
        let current = store.current_position("v1").unwrap();
        assert_eq!(current.coordinate.latitude, 41.0);
        assert_eq!(current.speed_kmh, 50.0);
        assert!(store.current_position("v2").is_none());
    }

    #[test]
    fn test_all_current_positions_sorted() {
        let mut store = PositionStore::new();
        store.update(PositionReport::new("v2", Coordinate::new(1.0, 1.0), 10.0, 0.0));
        store.update(PositionReport::new("v1", Coordinate::new(2.0, 2.0), 20.0, 0.0));

        let all = store.all_current_positions();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entity_id, "v1");
        assert_eq!(all[1].entity_id, "v2");
    }
}
