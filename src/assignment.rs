//! Distance-weighted worker assignment
//!
//! Every candidate supply point carries an expected worker count derived
//! from its distance to the zone hub. A worker is bound to the point with
//! the largest unmet demand and stays there until the point disappears.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::world::{PointId, WorkerId};

/// Constants of the expected-count curve for one family of supply points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssignmentProfile {
    pub base: f64,
    pub distance_factor: f64,
    pub min: u32,
    pub max: u32,
}

impl AssignmentProfile {
    /// Resource node gathering
    pub fn gathering() -> Self {
        Self {
            base: 2.0,
            distance_factor: 1.5,
            min: 1,
            max: 6,
        }
    }

    /// Field buffer hauling
    pub fn field_storage() -> Self {
        Self {
            base: 1.0,
            distance_factor: 1.0,
            min: 1,
            max: 3,
        }
    }

    /// Relay hauling
    pub fn relay() -> Self {
        Self {
            base: 1.0,
            distance_factor: 0.5,
            min: 1,
            max: 2,
        }
    }

    /// `round(base + distance / 10 * factor)` clamped to `[min, max]`.
    pub fn expected_workers(&self, distance: u32) -> u32 {
        let raw = (self.base + distance as f64 / 10.0 * self.distance_factor).round();
        let upper = self.max.max(self.min);
        (raw.max(0.0) as u32).clamp(self.min, upper)
    }
}

/// A point a worker can be bound to, with its distance to the zone hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyPoint {
    pub id: PointId,
    pub distance: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyStat {
    pub id: PointId,
    pub distance: u32,
    pub expected: u32,
    pub current: u32,
    pub deficit: i64,
}

fn bound_to(bindings: &BTreeMap<WorkerId, PointId>, point: PointId) -> u32 {
    bindings.values().filter(|bound| **bound == point).count() as u32
}

/// Expected, current and deficit for every candidate, in input order.
pub fn supply_stats(
    candidates: &[SupplyPoint],
    bindings: &BTreeMap<WorkerId, PointId>,
    profile: &AssignmentProfile,
) -> Vec<SupplyStat> {
    candidates
        .iter()
        .map(|point| {
            let expected = profile.expected_workers(point.distance);
            let current = bound_to(bindings, point.id);
            SupplyStat {
                id: point.id,
                distance: point.distance,
                expected,
                current,
                deficit: expected as i64 - current as i64,
            }
        })
        .collect()
}

/// Picks the candidate with the greatest deficit. Equal deficits go to the
/// point closer to the hub, then to the earlier candidate.
pub fn assign_optimal(
    candidates: &[SupplyPoint],
    bindings: &BTreeMap<WorkerId, PointId>,
    profile: &AssignmentProfile,
) -> Option<PointId> {
    let mut best: Option<SupplyStat> = None;
    for stat in supply_stats(candidates, bindings, profile) {
        let better = match &best {
            None => true,
            Some(current) => {
                stat.deficit > current.deficit
                    || (stat.deficit == current.deficit && stat.distance < current.distance)
            }
        };
        if better {
            best = Some(stat);
        }
    }
    best.map(|stat| stat.id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOutcome {
    /// The existing binding still references a point that exists.
    Kept(PointId),
    Assigned(PointId),
    /// The previous point vanished and a new one was chosen.
    Reassigned { from: PointId, to: PointId },
    /// No candidate exists; the worker stays idle.
    Idle,
}

impl BindingOutcome {
    pub fn point(self) -> Option<PointId> {
        match self {
            BindingOutcome::Kept(point) | BindingOutcome::Assigned(point) => Some(point),
            BindingOutcome::Reassigned { to, .. } => Some(to),
            BindingOutcome::Idle => None,
        }
    }

    pub fn changed(self) -> bool {
        matches!(
            self,
            BindingOutcome::Assigned(_) | BindingOutcome::Reassigned { .. }
        )
    }
}

/// Keeps a binding whose point still `exists`, otherwise runs assignment.
/// A binding survives even when its point left the candidate list. The
/// worker's own stale entry is ignored when counting live bindings.
pub fn resolve_binding(
    worker: WorkerId,
    current: Option<PointId>,
    exists: impl Fn(PointId) -> bool,
    candidates: &[SupplyPoint],
    bindings: &BTreeMap<WorkerId, PointId>,
    profile: &AssignmentProfile,
) -> BindingOutcome {
    if let Some(point) = current.filter(|point| exists(*point)) {
        return BindingOutcome::Kept(point);
    }

    let others: BTreeMap<WorkerId, PointId> = bindings
        .iter()
        .filter(|(id, _)| **id != worker)
        .map(|(id, point)| (*id, *point))
        .collect();

    match (current, assign_optimal(candidates, &others, profile)) {
        (_, None) => BindingOutcome::Idle,
        (None, Some(to)) => BindingOutcome::Assigned(to),
        (Some(from), Some(to)) => BindingOutcome::Reassigned { from, to },
    }
}
