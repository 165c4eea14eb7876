//! Per-zone control loop
//!
//! Each step: refresh metrics, reclassify when due, pick the state's role
//! table, drop roles whose gates are closed, schedule at most one
//! production, then resolve bindings for every worker of the zone.

use tracing::{debug, info, warn};

use crate::{
    assignment::{resolve_binding, AssignmentProfile, BindingOutcome, SupplyPoint},
    classifier::ZoneState,
    config::ColonyConfig,
    geometry::Position,
    population::PopulationSnapshot,
    relay::{relay_role, relays_needing_haul, RelayRole},
    roles::{Role, RoleTable},
    scheduler::{schedule_next, FacilityHandle, ProductionFacility, ProductionResult},
    world::{Colony, WorkerId, Zone, ZoneId},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStepReport {
    pub zone: ZoneId,
    /// Previous and new state when this step changed the state or
    /// classified the zone for the first time.
    pub transition: Option<(ZoneState, ZoneState)>,
    pub role_table_id: String,
    pub production: ProductionResult,
    pub bindings: Vec<(WorkerId, BindingOutcome)>,
}

/// Whether production of `role` makes sense for the zone right now.
pub fn role_gate_open(zone: &Zone, role: Role, config: &ColonyConfig) -> bool {
    match role {
        Role::RelayHauler => {
            !relays_needing_haul(&zone.relays, &zone.node_positions(), &config.relay).is_empty()
        }
        Role::Claimer => {
            zone.level >= config.gating.claim_min_level
                && zone.expansion.as_ref().is_some_and(|target| !target.claimed)
        }
        Role::FieldHauler => zone.field_buffers().next().is_some(),
        Role::ReservoirHauler => zone.reservoir().is_some(),
        Role::Gatherer | Role::Builder | Role::Upgrader => true,
    }
}

/// Copy of `table` without the roles whose gates are closed. Configs with
/// unresolvable roles are kept so scheduling can report them.
pub fn gated_table(table: &RoleTable, zone: &Zone, config: &ColonyConfig) -> RoleTable {
    table.filtered(|role_config| match role_config.resolve_role() {
        Ok(role) => role_gate_open(zone, role, config),
        Err(_) => true,
    })
}

/// Supply points a role may bind to, with the profile that weighs them.
pub fn supply_points(
    zone: &Zone,
    role: Role,
    config: &ColonyConfig,
) -> Option<(Vec<SupplyPoint>, AssignmentProfile)> {
    let hub = zone.hub;
    let point = |id, position: Position| SupplyPoint {
        id,
        distance: hub.distance(position),
    };
    let nodes: Vec<SupplyPoint> = zone
        .nodes
        .iter()
        .map(|node| point(node.id, node.position))
        .collect();
    let storages: Vec<SupplyPoint> = zone
        .storages
        .iter()
        .map(|storage| point(storage.id, storage.position))
        .collect();
    let profiles = &config.assignment;

    match role {
        Role::Gatherer => Some((nodes, profiles.gathering)),
        Role::FieldHauler => Some((
            zone.field_buffers()
                .map(|storage| point(storage.id, storage.position))
                .collect(),
            profiles.field_storage,
        )),
        Role::ReservoirHauler => Some((
            zone.reservoir()
                .map(|storage| point(storage.id, storage.position))
                .into_iter()
                .collect(),
            profiles.field_storage,
        )),
        Role::RelayHauler => {
            let node_positions = zone.node_positions();
            Some((
                zone.relays
                    .iter()
                    .filter(|relay| {
                        relay_role(relay.position, &node_positions, config.relay.source_radius)
                            == RelayRole::SinkSide
                    })
                    .map(|relay| point(relay.id, relay.position))
                    .collect(),
                profiles.relay,
            ))
        }
        Role::Builder | Role::Upgrader if !storages.is_empty() => {
            Some((storages, profiles.field_storage))
        }
        Role::Builder | Role::Upgrader => Some((nodes, profiles.gathering)),
        Role::Claimer => None,
    }
}

fn log_production(zone: &str, result: &ProductionResult) {
    match result {
        Ok(produced) => info!(
            "zone {zone}: producing {} ({} parts, {} energy)",
            produced.role,
            produced.body.len(),
            produced.body.cost()
        ),
        Err(failure) if failure.is_anomaly() => {
            warn!("zone {zone}: production {}: {failure}", failure.category())
        }
        Err(failure) => debug!("zone {zone}: production {}: {failure}", failure.category()),
    }
}

/// Runs the control loop for one zone. Returns `None` for unknown zones.
pub fn run_zone_step(colony: &mut Colony, zone_id: ZoneId, step: u64) -> Option<ZoneStepReport> {
    let mut population = PopulationSnapshot::capture(&*colony, zone_id);

    let Colony {
        zones,
        workers,
        ids,
        config,
        ledger,
        ..
    } = colony;
    let zone = zones.get_mut(&zone_id)?;

    let metrics = zone.metrics();
    let transition = zone
        .status
        .refresh(step, &metrics, &config.classifier)
        .map(|previous| (previous, zone.status.state));
    if let Some((previous, next)) = transition {
        if previous != next {
            info!("zone {}: state {previous} -> {next}", zone.name);
        } else {
            info!("zone {}: classified {next}", zone.name);
        }
    }

    let table = zone.tables.select(zone.status.state, zone.level).clone();
    if zone.status.role_table_id != table.id() {
        debug!(
            "zone {}: role table {} -> {}",
            zone.name,
            zone.status.role_table_id,
            table.id()
        );
        zone.status.role_table_id = table.id().to_string();
    }
    let gated = gated_table(&table, zone, config);

    let production = {
        let mut handle = zone
            .facility
            .as_mut()
            .map(|facility| FacilityHandle::new(facility, ids));
        schedule_next(
            &gated,
            &population,
            handle.as_mut().map(|h| h as &mut dyn ProductionFacility),
        )
    };
    log_production(&zone.name, &production);
    if production.is_ok() {
        ledger.produced += 1;
    }

    let mut worker_ids: Vec<WorkerId> = workers
        .values()
        .filter(|worker| worker.home_zone == zone_id)
        .map(|worker| worker.id)
        .collect();
    worker_ids.sort();

    let mut bindings = Vec::new();
    for worker_id in worker_ids {
        let Some(worker) = workers.get_mut(&worker_id) else {
            continue;
        };
        let Some((candidates, profile)) = supply_points(zone, worker.role, config) else {
            continue;
        };
        let outcome = resolve_binding(
            worker.id,
            worker.binding,
            |point| zone.point_position(point).is_some(),
            &candidates,
            population.bindings(worker.role),
            &profile,
        );
        match outcome {
            BindingOutcome::Kept(_) => {}
            BindingOutcome::Assigned(point) => {
                info!("zone {}: {} {} bound to {point}", zone.name, worker.role, worker.id);
                worker.binding = Some(point);
                population.record_binding(worker.role, worker.id, point);
            }
            BindingOutcome::Reassigned { from, to } => {
                info!(
                    "zone {}: {} {} rebound {from} -> {to}",
                    zone.name, worker.role, worker.id
                );
                worker.binding = Some(to);
                population.record_binding(worker.role, worker.id, to);
            }
            BindingOutcome::Idle => {
                if let Some(stale) = worker.binding.take() {
                    debug!(
                        "zone {}: {} {} lost {stale}, no candidates",
                        zone.name, worker.role, worker.id
                    );
                    population.release(worker.role, worker.id);
                }
            }
        }
        if !matches!(outcome, BindingOutcome::Kept(_)) {
            bindings.push((worker.id, outcome));
        }
    }

    Some(ZoneStepReport {
        zone: zone_id,
        transition,
        role_table_id: table.id().to_string(),
        production,
        bindings,
    })
}
