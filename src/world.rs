use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
    behavior::WaitState,
    classifier::{
        detect_emergency, DevelopmentStage, EmergencyReport, ZoneMetrics, ZoneState, ZoneStatus,
    },
    config::ColonyConfig,
    geometry::Position,
    population::PopulationRegistry,
    relay::{relay_stats, Relay, RelayNetwork, RelayStats},
    roles::{BodySpec, Role, RoleTable, TableSet},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(u64);

impl ZoneId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone-{}", self.0)
    }
}

/// Stable identifier of anything a worker can be bound to or deliver to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(u64);

impl PointId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "point-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl WorkerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next_zone: u64,
    next_point: u64,
    next_worker: u64,
}

impl IdAllocator {
    pub fn zone(&mut self) -> ZoneId {
        let id = ZoneId(self.next_zone);
        self.next_zone += 1;
        id
    }

    pub fn point(&mut self) -> PointId {
        let id = PointId(self.next_point);
        self.next_point += 1;
        id
    }

    pub fn worker(&mut self) -> WorkerId {
        let id = WorkerId(self.next_worker);
        self.next_worker += 1;
        id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: PointId,
    pub position: Position,
    pub amount: u32,
    pub capacity: u32,
    pub regen_amount: u32,
    pub regen_interval: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    FieldBuffer,
    Reservoir,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    pub id: PointId,
    pub kind: StorageKind,
    pub position: Position,
    pub amount: u32,
    pub capacity: u32,
}

impl Storage {
    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnJob {
    pub worker: WorkerId,
    pub role: Role,
    pub body: BodySpec,
    pub remaining: u32,
}

/// The zone's single production facility and its energy pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: PointId,
    pub position: Position,
    pub energy: u32,
    pub capacity: u32,
    pub job: Option<SpawnJob>,
}

impl Facility {
    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.energy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    FieldBuffer,
    Relay,
    Defense,
    /// Adds pool capacity to the facility.
    Extension,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionSite {
    pub id: PointId,
    pub kind: SiteKind,
    pub position: Position,
    pub progress: u32,
    pub required: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defense {
    pub id: PointId,
    pub position: Position,
    pub hits: u32,
    pub max_hits: u32,
}

impl Defense {
    pub fn integrity(&self) -> f64 {
        self.hits as f64 / self.max_hits.max(1) as f64
    }

    pub fn is_operational(&self) -> bool {
        self.hits > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hostile {
    pub power: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatProfile {
    /// Chance per step that an incursion starts while none is active.
    pub incursion_chance: f64,
    pub power: u32,
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionTarget {
    pub name: String,
    pub position: Position,
    pub claimed: bool,
}

#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub level: u32,
    pub progress: u64,
    pub hub: Position,
    pub controller: Position,
    pub facility: Option<Facility>,
    pub nodes: Vec<ResourceNode>,
    pub storages: Vec<Storage>,
    pub relays: Vec<Relay>,
    pub sites: Vec<ConstructionSite>,
    pub defenses: Vec<Defense>,
    pub hostiles: Vec<Hostile>,
    pub threat: ThreatProfile,
    pub expansion: Option<ExpansionTarget>,
    pub status: ZoneStatus,
    pub tables: TableSet,
    pub router: RelayNetwork,
}

impl Zone {
    pub fn metrics(&self) -> ZoneMetrics {
        let (pool, capacity) = self
            .facility
            .as_ref()
            .map_or((0, 0), |facility| (facility.energy, facility.capacity));
        let integrity = if self.defenses.is_empty() {
            1.0
        } else {
            self.defenses.iter().map(Defense::integrity).sum::<f64>() / self.defenses.len() as f64
        };
        ZoneMetrics {
            energy_stored: pool + self.reservoir().map_or(0, |storage| storage.amount),
            energy_capacity: capacity,
            hostile_present: !self.hostiles.is_empty(),
            hostile_power: self.hostiles.iter().map(|hostile| hostile.power).sum(),
            open_construction_sites: self.sites.len() as u32,
            damaged_structure_count: self
                .defenses
                .iter()
                .filter(|defense| defense.integrity() < 0.5)
                .count() as u32,
            development_level: self.level,
            defensive_structures: self
                .defenses
                .iter()
                .filter(|defense| defense.is_operational())
                .count() as u32,
            defensive_integrity: integrity,
        }
    }

    pub fn stage(&self) -> DevelopmentStage {
        DevelopmentStage::from_level(self.level)
    }

    pub fn current_table(&self) -> &RoleTable {
        self.tables.select(self.status.state, self.level)
    }

    pub fn reservoir(&self) -> Option<&Storage> {
        self.storages
            .iter()
            .find(|storage| storage.kind == StorageKind::Reservoir)
    }

    pub fn field_buffers(&self) -> impl Iterator<Item = &Storage> {
        self.storages
            .iter()
            .filter(|storage| storage.kind == StorageKind::FieldBuffer)
    }

    pub fn node_positions(&self) -> Vec<Position> {
        self.nodes.iter().map(|node| node.position).collect()
    }

    pub fn node(&self, id: PointId) -> Option<&ResourceNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn storage(&self, id: PointId) -> Option<&Storage> {
        self.storages.iter().find(|storage| storage.id == id)
    }

    pub fn relay(&self, id: PointId) -> Option<&Relay> {
        self.relays.iter().find(|relay| relay.id == id)
    }

    /// Position of any addressable point in the zone.
    pub fn point_position(&self, id: PointId) -> Option<Position> {
        self.node(id)
            .map(|node| node.position)
            .or_else(|| self.storage(id).map(|storage| storage.position))
            .or_else(|| self.relay(id).map(|relay| relay.position))
            .or_else(|| {
                self.facility
                    .as_ref()
                    .filter(|facility| facility.id == id)
                    .map(|facility| facility.position)
            })
            .or_else(|| {
                self.sites
                    .iter()
                    .find(|site| site.id == id)
                    .map(|site| site.position)
            })
    }

    pub fn relay_stats(&self, radius: u32) -> RelayStats {
        relay_stats(&self.relays, &self.node_positions(), radius)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerUnit {
    pub id: WorkerId,
    pub role: Role,
    pub home_zone: ZoneId,
    pub body: BodySpec,
    pub position: Position,
    pub load: u32,
    pub binding: Option<PointId>,
    pub lifetime: u32,
    /// True while carrying energy to a target, false while collecting.
    pub delivering: bool,
    pub wait: Option<WaitState>,
}

impl WorkerUnit {
    pub fn free(&self) -> u32 {
        self.body.carry_capacity().saturating_sub(self.load)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub produced: u64,
    pub expired: u64,
    pub harvested: u64,
    pub relay_transfers: u64,
    pub sites_completed: u64,
    pub level_ups: u64,
    pub claims: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedZone {
    pub zone_id: ZoneId,
    #[serde(flatten)]
    pub status: ZoneStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedWorker {
    pub worker_id: WorkerId,
    pub role: Role,
    pub bound_point_id: Option<PointId>,
    pub zone_id: ZoneId,
}

/// Minimal state needed to resume control of a colony.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub zones: Vec<PersistedZone>,
    pub workers: Vec<PersistedWorker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub id: u64,
    pub name: String,
    pub state: ZoneState,
    pub stage: DevelopmentStage,
    pub level: u32,
    pub role_table_id: String,
    pub energy_stored: u32,
    pub energy_capacity: u32,
    pub open_sites: u32,
    pub hostiles: u32,
    pub population: BTreeMap<Role, u32>,
    pub relays: RelayStats,
    pub emergency: Option<EmergencyReport>,
    pub expansion_claimed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColonySnapshot {
    pub scenario: String,
    pub tick: u64,
    pub total_workers: usize,
    pub ledger: Ledger,
    pub zones: Vec<ZoneSnapshot>,
    pub persisted: PersistedState,
}

#[derive(Debug)]
pub struct Colony {
    tick: u64,
    pub(crate) ids: IdAllocator,
    pub(crate) zones: HashMap<ZoneId, Zone>,
    pub(crate) workers: HashMap<WorkerId, WorkerUnit>,
    pub(crate) config: ColonyConfig,
    pub(crate) ledger: Ledger,
}

impl Colony {
    pub fn new(config: ColonyConfig) -> Self {
        Self {
            tick: 0,
            ids: IdAllocator::default(),
            zones: HashMap::new(),
            workers: HashMap::new(),
            config,
            ledger: Ledger::default(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn advance_time(&mut self) {
        self.tick += 1;
    }

    pub fn config(&self) -> &ColonyConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub fn insert_zone(&mut self, zone: Zone) -> ZoneId {
        let id = self.ids.zone();
        self.zones.insert(id, zone);
        id
    }

    pub fn insert_worker(&mut self, worker: WorkerUnit) {
        self.workers.insert(worker.id, worker);
    }

    pub fn zone_ids(&self) -> Vec<ZoneId> {
        let mut ids: Vec<_> = self.zones.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self.workers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn zone_by_name(&self, name: &str) -> Option<ZoneId> {
        self.zone_ids()
            .into_iter()
            .find(|id| self.zones.get(id).is_some_and(|zone| zone.name == name))
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    pub fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(&id)
    }

    pub fn worker(&self, id: WorkerId) -> Option<&WorkerUnit> {
        self.workers.get(&id)
    }

    pub fn worker_mut(&mut self, id: WorkerId) -> Option<&mut WorkerUnit> {
        self.workers.get_mut(&id)
    }

    pub fn remove_worker(&mut self, id: WorkerId) -> Option<WorkerUnit> {
        self.workers.remove(&id)
    }

    pub fn total_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn zone_state(&self, id: ZoneId) -> Option<ZoneState> {
        self.zones.get(&id).map(|zone| zone.status.state)
    }

    pub fn current_role_table(&self, id: ZoneId) -> Option<&RoleTable> {
        self.zones.get(&id).map(Zone::current_table)
    }

    pub fn emergency(&self, id: ZoneId) -> Option<EmergencyReport> {
        let zone = self.zones.get(&id)?;
        let metrics = zone.metrics();
        let operational = metrics.defensive_structures;
        detect_emergency(
            &metrics,
            zone.facility.is_some(),
            self.zone_population(id),
            operational,
            &self.config.classifier,
        )
    }

    fn zone_population(&self, zone: ZoneId) -> usize {
        self.workers
            .values()
            .filter(|worker| worker.home_zone == zone)
            .count()
    }

    pub fn persisted_state(&self) -> PersistedState {
        let zones = self
            .zone_ids()
            .into_iter()
            .filter_map(|id| {
                self.zones.get(&id).map(|zone| PersistedZone {
                    zone_id: id,
                    status: zone.status.clone(),
                })
            })
            .collect();
        let workers = self
            .worker_ids()
            .into_iter()
            .filter_map(|id| self.workers.get(&id))
            .map(|worker| PersistedWorker {
                worker_id: worker.id,
                role: worker.role,
                bound_point_id: worker.binding,
                zone_id: worker.home_zone,
            })
            .collect();
        PersistedState { zones, workers }
    }

    /// Restores zone statuses and the bindings of workers that are still
    /// alive with the same role and home zone. Returns how many records applied.
    pub fn apply_persisted(&mut self, state: &PersistedState) -> usize {
        let mut applied = 0;
        for record in &state.zones {
            if let Some(zone) = self.zones.get_mut(&record.zone_id) {
                zone.status = record.status.clone();
                applied += 1;
            }
        }
        for record in &state.workers {
            if let Some(worker) = self.workers.get_mut(&record.worker_id) {
                if worker.role == record.role && worker.home_zone == record.zone_id {
                    worker.binding = record.bound_point_id;
                    applied += 1;
                }
            }
        }
        applied
    }

    pub fn snapshot(&self, scenario: &str) -> ColonySnapshot {
        let radius = self.config.relay.source_radius;
        let mut zones = Vec::with_capacity(self.zones.len());
        for id in self.zone_ids() {
            let Some(zone) = self.zones.get(&id) else {
                continue;
            };
            let metrics = zone.metrics();
            let population = Role::ALL
                .into_iter()
                .map(|role| (role, self.count_by_role(id, role)))
                .filter(|(_, count)| *count > 0)
                .collect();
            zones.push(ZoneSnapshot {
                id: id.raw(),
                name: zone.name.clone(),
                state: zone.status.state,
                stage: zone.stage(),
                level: zone.level,
                role_table_id: zone.status.role_table_id.clone(),
                energy_stored: metrics.energy_stored,
                energy_capacity: metrics.energy_capacity,
                open_sites: metrics.open_construction_sites,
                hostiles: zone.hostiles.len() as u32,
                population,
                relays: zone.relay_stats(radius),
                emergency: self.emergency(id),
                expansion_claimed: zone.expansion.as_ref().map(|target| target.claimed),
            });
        }
        ColonySnapshot {
            scenario: scenario.to_string(),
            tick: self.tick,
            total_workers: self.workers.len(),
            ledger: self.ledger.clone(),
            zones,
            persisted: self.persisted_state(),
        }
    }
}

impl PopulationRegistry for Colony {
    fn count_by_role(&self, zone: ZoneId, role: Role) -> u32 {
        self.workers
            .values()
            .filter(|worker| worker.home_zone == zone && worker.role == role)
            .count() as u32
    }

    fn list_bindings(&self, zone: ZoneId, role: Role) -> BTreeMap<WorkerId, PointId> {
        self.workers
            .values()
            .filter(|worker| worker.home_zone == zone && worker.role == role)
            .filter_map(|worker| worker.binding.map(|point| (worker.id, point)))
            .collect()
    }
}
