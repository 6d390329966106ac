/*!
Plugin-based violation detection: membership transitions, speed limits and
authorization checks evaluated against a registry snapshot
*/

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::DetectionConfig;
use crate::core::geofence::Geofence;
use crate::core::geometry::Coordinate;
use crate::core::position::PositionReport;
use crate::core::state_manager::MembershipTracker;

/// Kinds of geofence violations the engine can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Entry,
    Exit,
    SpeedLimit,
    UnauthorizedArea,
}

/// Severity attached to a violation, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// An immutable violation record produced during one evaluation cycle.
///
/// The id exists only for delivery; records are not retained in memory
/// beyond the cycle that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub entity_id: String,
    pub driver_id: Option<String>,
    pub geofence_id: String,
    pub geofence_name: String,
    pub kind: ViolationKind,
    pub location: Coordinate,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub description: String,
}

/// Deterministic severity for a violation kind against a fence.
pub fn classify_severity(kind: ViolationKind, fence: &Geofence) -> Severity {
    match kind {
        ViolationKind::UnauthorizedArea => Severity::Critical,
        ViolationKind::SpeedLimit => Severity::High,
        ViolationKind::Exit => {
            if fence.is_restricted() {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
        ViolationKind::Entry => {
            if fence.authorized {
                Severity::Low
            } else {
                Severity::High
            }
        }
    }
}

/// Everything a check needs to judge one report against one fence
pub struct CheckContext<'a> {
    pub report: &'a PositionReport,
    pub fence: &'a Geofence,
    /// Whether the fence was in the entity's membership set before this report
    pub was_inside: bool,
    /// Whether the report's coordinate lies inside the fence
    pub is_inside: bool,
}

impl CheckContext<'_> {
    fn violation(&self, kind: ViolationKind, description: String) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            entity_id: self.report.entity_id.clone(),
            driver_id: self.report.driver_id.clone(),
            geofence_id: self.fence.id.clone(),
            geofence_name: self.fence.name.clone(),
            kind,
            location: self.report.coordinate,
            timestamp: self.report.timestamp,
            severity: classify_severity(kind, self.fence),
            description,
        }
    }
}

/// Trait for violation check plugins
pub trait ViolationCheck: Send + Sync {
    /// Name of the check
    fn name(&self) -> &'static str;

    /// Kinds of violations this check can produce
    fn supported_kinds(&self) -> Vec<ViolationKind>;

    /// Judge one report against one fence
    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation>;
}

/// Detects entry and exit transitions from the membership diff
struct BoundaryTransitionCheck;

impl ViolationCheck for BoundaryTransitionCheck {
    fn name(&self) -> &'static str {
        "BoundaryTransition"
    }

    fn supported_kinds(&self) -> Vec<ViolationKind> {
        vec![ViolationKind::Entry, ViolationKind::Exit]
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if ctx.is_inside && !ctx.was_inside {
            return vec![ctx.violation(
                ViolationKind::Entry,
                format!(
                    "{} entered geofence {}",
                    ctx.report.entity_id, ctx.fence.name
                ),
            )];
        }
        if !ctx.is_inside && ctx.was_inside {
            return vec![ctx.violation(
                ViolationKind::Exit,
                format!("{} exited geofence {}", ctx.report.entity_id, ctx.fence.name),
            )];
        }
        vec![]
    }
}

/// Flags reports whose speed exceeds a fence's limit while inside.
///
/// Fires on every report until the speed drops to the limit or the entity
/// exits, not just on the first offense.
struct SpeedLimitCheck;

impl ViolationCheck for SpeedLimitCheck {
    fn name(&self) -> &'static str {
        "SpeedLimit"
    }

    fn supported_kinds(&self) -> Vec<ViolationKind> {
        vec![ViolationKind::SpeedLimit]
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if !ctx.is_inside {
            return vec![];
        }
        match ctx.fence.max_speed_kmh {
            Some(limit) if ctx.report.speed_kmh > limit => vec![ctx.violation(
                ViolationKind::SpeedLimit,
                format!(
                    "{} at {:.1} km/h exceeds the {:.1} km/h limit in {}",
                    ctx.report.entity_id, ctx.report.speed_kmh, limit, ctx.fence.name
                ),
            )],
            _ => vec![],
        }
    }
}

/// Flags any presence inside a fence that does not authorize entities.
///
/// Fires on every report while the entity remains inside.
struct AuthorizedAreaCheck;

impl ViolationCheck for AuthorizedAreaCheck {
    fn name(&self) -> &'static str {
        "AuthorizedArea"
    }

    fn supported_kinds(&self) -> Vec<ViolationKind> {
        vec![ViolationKind::UnauthorizedArea]
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if ctx.is_inside && ctx.fence.is_restricted() {
            return vec![ctx.violation(
                ViolationKind::UnauthorizedArea,
                format!(
                    "{} is inside unauthorized area {}",
                    ctx.report.entity_id, ctx.fence.name
                ),
            )];
        }
        vec![]
    }
}

/// Main detection engine that coordinates the enabled checks
pub struct DetectionEngine {
    checks: Vec<Box<dyn ViolationCheck>>,
}

impl DetectionEngine {
    pub fn new(config: &DetectionConfig) -> Self {
        let mut checks: Vec<Box<dyn ViolationCheck>> = vec![
            Box::new(BoundaryTransitionCheck),
            Box::new(SpeedLimitCheck),
            Box::new(AuthorizedAreaCheck),
        ];

        // Filter checks based on configuration
        checks.retain(|check| {
            check
                .supported_kinds()
                .iter()
                .any(|kind| config.violation_kinds.contains(kind))
        });

        info!("initialized detection engine with {} checks", checks.len());

        Self { checks }
    }

    /// Evaluate one report against a registry snapshot.
    ///
    /// Full re-evaluation against all active fences: the membership diff is
    /// taken against the entity's previous set, the new set replaces it at
    /// the end, and all applicable checks fire independently on every cycle.
    /// A fence that cannot be evaluated is skipped for this cycle without
    /// aborting the rest.
    pub fn process_report(
        &self,
        report: &PositionReport,
        snapshot: &[Arc<Geofence>],
        membership: &mut MembershipTracker,
    ) -> Vec<Violation> {
        let prev = membership.current_set(&report.entity_id);
        let mut next = HashSet::new();
        let mut violations = Vec::new();

        for fence in snapshot {
            let is_inside = match fence.contains(report.coordinate) {
                Ok(inside) => inside,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };
            if is_inside {
                next.insert(fence.id.clone());
            }

            let ctx = CheckContext {
                report,
                fence,
                was_inside: prev.contains(&fence.id),
                is_inside,
            };
            for check in &self.checks {
                for violation in check.check(&ctx) {
                    info!(
                        "{} flagged {:?} for {} in geofence {}",
                        check.name(),
                        violation.kind,
                        report.entity_id,
                        fence.id
                    );
                    violations.push(violation);
                }
            }
        }

        membership.replace(&report.entity_id, next);
        violations
    }
}
