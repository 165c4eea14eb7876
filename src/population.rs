//! Zone-scoped population views
//!
//! The controller never reads live worker state directly. It captures a
//! read-only [`PopulationSnapshot`] at the start of a zone step and passes it
//! into scheduling and assignment; only bindings made during that step are
//! written back into the snapshot.

use std::collections::BTreeMap;

use crate::{
    roles::Role,
    world::{PointId, WorkerId, ZoneId},
};

/// Live population lookups, always scoped to one zone.
pub trait PopulationRegistry {
    fn count_by_role(&self, zone: ZoneId, role: Role) -> u32;
    fn list_bindings(&self, zone: ZoneId, role: Role) -> BTreeMap<WorkerId, PointId>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationSnapshot {
    zone: Option<ZoneId>,
    counts: BTreeMap<Role, u32>,
    bindings: BTreeMap<Role, BTreeMap<WorkerId, PointId>>,
}

impl PopulationSnapshot {
    pub fn capture(registry: &impl PopulationRegistry, zone: ZoneId) -> Self {
        let mut counts = BTreeMap::new();
        let mut bindings = BTreeMap::new();
        for role in Role::ALL {
            counts.insert(role, registry.count_by_role(zone, role));
            bindings.insert(role, registry.list_bindings(zone, role));
        }
        Self {
            zone: Some(zone),
            counts,
            bindings,
        }
    }

    pub fn zone(&self) -> Option<ZoneId> {
        self.zone
    }

    pub fn count(&self, role: Role) -> u32 {
        self.counts.get(&role).copied().unwrap_or(0)
    }

    pub fn bindings(&self, role: Role) -> &BTreeMap<WorkerId, PointId> {
        static EMPTY: BTreeMap<WorkerId, PointId> = BTreeMap::new();
        self.bindings.get(&role).unwrap_or(&EMPTY)
    }

    /// Records a binding made during the current step.
    pub fn record_binding(&mut self, role: Role, worker: WorkerId, point: PointId) {
        self.bindings.entry(role).or_default().insert(worker, point);
    }

    pub fn release(&mut self, role: Role, worker: WorkerId) {
        if let Some(bindings) = self.bindings.get_mut(&role) {
            bindings.remove(&worker);
        }
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }
}

impl PopulationRegistry for PopulationSnapshot {
    fn count_by_role(&self, zone: ZoneId, role: Role) -> u32 {
        if self.zone == Some(zone) {
            self.count(role)
        } else {
            0
        }
    }

    fn list_bindings(&self, zone: ZoneId, role: Role) -> BTreeMap<WorkerId, PointId> {
        if self.zone == Some(zone) {
            self.bindings(role).clone()
        } else {
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Roster(Vec<(ZoneId, Role, WorkerId, Option<PointId>)>);

    impl PopulationRegistry for Roster {
        fn count_by_role(&self, zone: ZoneId, role: Role) -> u32 {
            self.0
                .iter()
                .filter(|(z, r, _, _)| *z == zone && *r == role)
                .count() as u32
        }

        fn list_bindings(&self, zone: ZoneId, role: Role) -> BTreeMap<WorkerId, PointId> {
            self.0
                .iter()
                .filter(|(z, r, _, _)| *z == zone && *r == role)
                .filter_map(|(_, _, worker, point)| point.map(|p| (*worker, p)))
                .collect()
        }
    }

    #[test]
    fn capture_ignores_other_zones() {
        let home = ZoneId::new(0);
        let away = ZoneId::new(1);
        let roster = Roster(vec![
            (home, Role::Gatherer, WorkerId::new(1), Some(PointId::new(5))),
            (home, Role::Gatherer, WorkerId::new(2), None),
            (away, Role::Gatherer, WorkerId::new(3), Some(PointId::new(5))),
        ]);
        let snapshot = PopulationSnapshot::capture(&roster, home);
        assert_eq!(snapshot.count(Role::Gatherer), 2);
        assert_eq!(snapshot.bindings(Role::Gatherer).len(), 1);
        assert_eq!(snapshot.count_by_role(away, Role::Gatherer), 0);
        assert_eq!(snapshot.total(), 2);
    }

    #[test]
    fn bindings_made_mid_step_are_visible() {
        let home = ZoneId::new(0);
        let mut snapshot = PopulationSnapshot::capture(&Roster(Vec::new()), home);
        snapshot.record_binding(Role::Builder, WorkerId::new(4), PointId::new(9));
        assert_eq!(
            snapshot.list_bindings(home, Role::Builder).get(&WorkerId::new(4)),
            Some(&PointId::new(9))
        );
        snapshot.release(Role::Builder, WorkerId::new(4));
        assert!(snapshot.bindings(Role::Builder).is_empty());
    }
}
