//! Per-role worker behaviour
//!
//! Workers alternate between collecting from their bound supply point and
//! delivering to a role-specific target. Anything that cannot finish in the
//! current step leaves the worker in a [`WaitState`] for the next.

use serde::{Deserialize, Serialize};

use crate::{
    config::RelayConfig,
    geometry::Position,
    relay::{relay_role, RelayRole},
    roles::{BodyPart, Role},
    world::{
        ConstructionSite, Defense, PointId, SiteKind, Storage, StorageKind, WorkerUnit, Zone,
    },
};

/// Progress needed to leave each development level.
pub const LEVEL_PROGRESS: [u64; 7] = [
    200, 45_000, 135_000, 405_000, 1_215_000, 3_645_000, 10_935_000,
];
pub const MAX_LEVEL: u32 = 8;

const HARVEST_PER_WORK: u32 = 2;
const BUILD_PER_WORK: u32 = 5;
const UPGRADE_PER_WORK: u32 = 1;
const FIELD_BUFFER_REACH: u32 = 3;
const FIELD_BUFFER_CAPACITY: u32 = 2_000;
const RELAY_CAPACITY: u32 = 800;
const DEFENSE_HITS: u32 = 1_000;
const EXTENSION_CAPACITY: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    /// No binding yet, or the bound point vanished this step.
    Unbound,
    /// The bound point holds no energy; the binding is kept.
    SupplyEmpty,
    NoDeliveryTarget,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Ongoing,
    Arrived,
    Unreachable,
}

pub trait Movement {
    fn move_toward(&mut self, worker: &mut WorkerUnit, target: Position) -> MoveOutcome;
}

/// One tile per step; adjacent counts as arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridMovement;

impl Movement for GridMovement {
    fn move_toward(&mut self, worker: &mut WorkerUnit, target: Position) -> MoveOutcome {
        if !target.in_bounds() {
            return MoveOutcome::Unreachable;
        }
        if worker.position.distance(target) <= 1 {
            return MoveOutcome::Arrived;
        }
        worker.position = worker.position.step_toward(target);
        MoveOutcome::Ongoing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Moving,
    Waiting(WaitState),
    Harvested(u32),
    Collected(u32),
    Delivered(u32),
    Built {
        amount: u32,
        completed: Option<SiteKind>,
    },
    Upgraded {
        amount: u32,
        leveled_up: bool,
    },
    Claimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Relay(PointId),
    Storage(PointId),
    Facility,
    Site(PointId),
    Controller,
}

/// Runs one step of `worker`'s role inside its home zone.
pub fn perform(
    worker: &mut WorkerUnit,
    zone: &mut Zone,
    movement: &mut dyn Movement,
    relay: &RelayConfig,
) -> Activity {
    if worker.delivering && worker.load == 0 {
        worker.delivering = false;
    }
    if !worker.delivering && worker.load > 0 && worker.free() == 0 {
        worker.delivering = true;
    }

    let activity = match worker.role {
        Role::Claimer => claim(worker, zone, movement),
        _ if worker.delivering => deliver(worker, zone, movement, relay),
        _ => collect(worker, zone, movement),
    };

    worker.wait = match activity {
        Activity::Waiting(state) => Some(state),
        _ => None,
    };
    if worker.load > 0 && worker.free() == 0 {
        worker.delivering = true;
    }
    activity
}

fn claim(worker: &mut WorkerUnit, zone: &mut Zone, movement: &mut dyn Movement) -> Activity {
    let Some(target) = zone.expansion.as_ref().filter(|target| !target.claimed) else {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    };
    let position = target.position;
    match movement.move_toward(worker, position) {
        MoveOutcome::Ongoing => Activity::Moving,
        MoveOutcome::Unreachable => Activity::Waiting(WaitState::Unreachable),
        MoveOutcome::Arrived => {
            if worker.body.count(BodyPart::Claim) == 0 {
                return Activity::Waiting(WaitState::NoDeliveryTarget);
            }
            if let Some(target) = zone.expansion.as_mut() {
                target.claimed = true;
            }
            Activity::Claimed
        }
    }
}

fn collect(worker: &mut WorkerUnit, zone: &mut Zone, movement: &mut dyn Movement) -> Activity {
    let Some(point) = worker.binding else {
        return Activity::Waiting(WaitState::Unbound);
    };
    let Some(position) = zone.point_position(point) else {
        return Activity::Waiting(WaitState::Unbound);
    };
    if worker.role == Role::ReservoirHauler
        && zone.facility.as_ref().map_or(true, |facility| facility.free() == 0)
    {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    }

    match movement.move_toward(worker, position) {
        MoveOutcome::Ongoing => return Activity::Moving,
        MoveOutcome::Unreachable => return Activity::Waiting(WaitState::Unreachable),
        MoveOutcome::Arrived => {}
    }

    let free = worker.free();
    let activity = if let Some(node) = zone.nodes.iter_mut().find(|node| node.id == point) {
        let amount = (worker.body.count(BodyPart::Work) * HARVEST_PER_WORK)
            .min(node.amount)
            .min(free);
        node.amount -= amount;
        worker.load += amount;
        if amount == 0 {
            Activity::Waiting(WaitState::SupplyEmpty)
        } else {
            Activity::Harvested(amount)
        }
    } else {
        let stock = zone
            .storages
            .iter_mut()
            .find(|storage| storage.id == point)
            .map(|storage| &mut storage.amount)
            .or_else(|| {
                zone.relays
                    .iter_mut()
                    .find(|relay| relay.id == point)
                    .map(|relay| &mut relay.amount)
            });
        match stock {
            Some(stock) => {
                let amount = (*stock).min(free);
                *stock -= amount;
                worker.load += amount;
                if amount == 0 {
                    Activity::Waiting(WaitState::SupplyEmpty)
                } else {
                    Activity::Collected(amount)
                }
            }
            None => Activity::Waiting(WaitState::Unbound),
        }
    };

    if activity == Activity::Waiting(WaitState::SupplyEmpty) && worker.load > 0 {
        worker.delivering = true;
    }
    activity
}

fn has_room(zone: &Zone, target: Target) -> bool {
    match target {
        Target::Facility => zone.facility.as_ref().is_some_and(|f| f.free() > 0),
        Target::Storage(id) => zone.storage(id).is_some_and(|s| s.free() > 0),
        Target::Relay(id) => zone.relay(id).is_some_and(|r| r.free() > 0),
        Target::Site(id) => zone.sites.iter().any(|site| site.id == id),
        Target::Controller => true,
    }
}

fn nearest<'a, T>(
    items: impl Iterator<Item = &'a T>,
    origin: Position,
    position: impl Fn(&T) -> Position,
) -> Option<&'a T>
where
    T: 'a,
{
    items.min_by_key(|item| position(item).distance(origin))
}

fn gatherer_target(worker: &WorkerUnit, zone: &Zone, relay: &RelayConfig) -> Option<Target> {
    let origin = worker
        .binding
        .and_then(|point| zone.point_position(point))
        .unwrap_or(worker.position);
    let nodes = zone.node_positions();

    let relay_target = nearest(
        zone.relays.iter().filter(|r| {
            r.free() > 0
                && r.position.within(origin, relay.source_radius)
                && relay_role(r.position, &nodes, relay.source_radius) == RelayRole::SourceSide
        }),
        origin,
        |r| r.position,
    )
    .map(|r| Target::Relay(r.id));
    if relay_target.is_some() {
        return relay_target;
    }

    let buffer = nearest(
        zone.field_buffers()
            .filter(|s| s.free() > 0 && s.position.within(origin, FIELD_BUFFER_REACH)),
        origin,
        |s| s.position,
    )
    .map(|s| Target::Storage(s.id));
    if buffer.is_some() {
        return buffer;
    }

    hub_target(zone, None)
}

/// Facility first, then the reservoir unless it is the worker's own supply.
fn hub_target(zone: &Zone, bound: Option<PointId>) -> Option<Target> {
    if has_room(zone, Target::Facility) {
        return Some(Target::Facility);
    }
    zone.reservoir()
        .filter(|reservoir| reservoir.free() > 0 && Some(reservoir.id) != bound)
        .map(|reservoir| Target::Storage(reservoir.id))
}

fn target_position(zone: &Zone, target: Target) -> Option<Position> {
    match target {
        Target::Facility => zone.facility.as_ref().map(|facility| facility.position),
        Target::Controller => Some(zone.controller),
        Target::Storage(id) | Target::Relay(id) | Target::Site(id) => zone.point_position(id),
    }
}

fn deliver(
    worker: &mut WorkerUnit,
    zone: &mut Zone,
    movement: &mut dyn Movement,
    relay: &RelayConfig,
) -> Activity {
    let target = match worker.role {
        Role::Gatherer => gatherer_target(worker, zone, relay),
        Role::FieldHauler | Role::RelayHauler | Role::ReservoirHauler => {
            hub_target(zone, worker.binding)
        }
        Role::Builder => nearest(zone.sites.iter(), worker.position, |site| site.position)
            .map(|site| Target::Site(site.id))
            .or(Some(Target::Controller)),
        Role::Upgrader => Some(Target::Controller),
        Role::Claimer => None,
    };
    let Some(target) = target else {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    };
    let Some(position) = target_position(zone, target) else {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    };

    match movement.move_toward(worker, position) {
        MoveOutcome::Ongoing => Activity::Moving,
        MoveOutcome::Unreachable => Activity::Waiting(WaitState::Unreachable),
        MoveOutcome::Arrived => match target {
            Target::Site(id) => build(worker, zone, id),
            Target::Controller => upgrade(worker, zone),
            _ => transfer(worker, zone, target),
        },
    }
}

fn transfer(worker: &mut WorkerUnit, zone: &mut Zone, target: Target) -> Activity {
    let slot = match target {
        Target::Facility => zone
            .facility
            .as_mut()
            .map(|facility| (&mut facility.energy, facility.capacity)),
        Target::Storage(id) => zone
            .storages
            .iter_mut()
            .find(|storage| storage.id == id)
            .map(|storage| (&mut storage.amount, storage.capacity)),
        Target::Relay(id) => zone
            .relays
            .iter_mut()
            .find(|relay| relay.id == id)
            .map(|relay| (&mut relay.amount, relay.capacity)),
        Target::Site(_) | Target::Controller => None,
    };
    let Some((amount, capacity)) = slot else {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    };
    let moved = worker.load.min(capacity.saturating_sub(*amount));
    if moved == 0 {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    }
    *amount += moved;
    worker.load -= moved;
    Activity::Delivered(moved)
}

fn build(worker: &mut WorkerUnit, zone: &mut Zone, site_id: PointId) -> Activity {
    let Some(index) = zone.sites.iter().position(|site| site.id == site_id) else {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    };
    let site = &mut zone.sites[index];
    let amount = (worker.body.count(BodyPart::Work) * BUILD_PER_WORK)
        .min(worker.load)
        .min(site.required.saturating_sub(site.progress));
    if amount == 0 && site.progress < site.required {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    }
    site.progress += amount;
    worker.load -= amount;

    let completed = if site.progress >= site.required {
        let site = zone.sites.remove(index);
        complete_site(zone, &site);
        Some(site.kind)
    } else {
        None
    };
    Activity::Built { amount, completed }
}

fn complete_site(zone: &mut Zone, site: &ConstructionSite) {
    match site.kind {
        SiteKind::FieldBuffer => zone.storages.push(Storage {
            id: site.id,
            kind: StorageKind::FieldBuffer,
            position: site.position,
            amount: 0,
            capacity: FIELD_BUFFER_CAPACITY,
        }),
        SiteKind::Relay => zone.relays.push(crate::relay::Relay {
            id: site.id,
            position: site.position,
            amount: 0,
            capacity: RELAY_CAPACITY,
            cooldown: 0,
        }),
        SiteKind::Defense => zone.defenses.push(Defense {
            id: site.id,
            position: site.position,
            hits: DEFENSE_HITS,
            max_hits: DEFENSE_HITS,
        }),
        SiteKind::Extension => {
            if let Some(facility) = zone.facility.as_mut() {
                facility.capacity += EXTENSION_CAPACITY;
            }
        }
    }
}

fn upgrade(worker: &mut WorkerUnit, zone: &mut Zone) -> Activity {
    let amount = (worker.body.count(BodyPart::Work) * UPGRADE_PER_WORK).min(worker.load);
    if amount == 0 {
        return Activity::Waiting(WaitState::NoDeliveryTarget);
    }
    worker.load -= amount;
    if zone.level >= MAX_LEVEL {
        return Activity::Upgraded {
            amount,
            leveled_up: false,
        };
    }
    zone.progress += amount as u64;
    let needed = LEVEL_PROGRESS[(zone.level.max(1) - 1) as usize];
    let leveled_up = zone.progress >= needed;
    if leveled_up {
        zone.progress -= needed;
        zone.level += 1;
    }
    Activity::Upgraded { amount, leveled_up }
}
