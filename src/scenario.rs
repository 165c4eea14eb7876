use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;

use crate::{
    classifier::{ProductionStrategy, ZoneState, ZoneStatus},
    config::ColonyConfig,
    geometry::Position,
    relay::{Relay, RelayNetwork},
    roles::{default_base_table, RoleConfig, RoleTable, TableSet},
    world::{
        Colony, ConstructionSite, Defense, ExpansionTarget, Facility, ResourceNode, SiteKind,
        Storage, StorageKind, ThreatProfile, Zone,
    },
};

fn default_snapshot_interval_ticks() -> u64 {
    25
}

fn default_level() -> u32 {
    1
}

fn default_facility_capacity() -> u32 {
    300
}

fn default_node_capacity() -> u32 {
    3_000
}

fn default_regen_amount() -> u32 {
    10
}

fn default_regen_interval() -> u64 {
    1
}

fn default_relay_capacity() -> u32 {
    800
}

fn default_site_required() -> u32 {
    1_000
}

fn default_defense_hits() -> u32 {
    1_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    #[serde(default)]
    pub config: ColonyConfig,
    /// Replaces the built-in base role table.
    #[serde(default)]
    pub base_table: Option<Vec<RoleConfig>>,
    /// Replaces the derived table of a state.
    #[serde(default)]
    pub state_tables: BTreeMap<ZoneState, Vec<RoleConfig>>,
    pub zones: Vec<ScenarioZone>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioZone {
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub progress: u64,
    pub hub: Position,
    /// Defaults to the hub.
    #[serde(default)]
    pub controller: Option<Position>,
    #[serde(default)]
    pub facility: Option<ScenarioFacility>,
    #[serde(default)]
    pub nodes: Vec<ScenarioNode>,
    #[serde(default)]
    pub storages: Vec<ScenarioStorage>,
    #[serde(default)]
    pub relays: Vec<ScenarioRelay>,
    #[serde(default)]
    pub sites: Vec<ScenarioSite>,
    #[serde(default)]
    pub defenses: Vec<ScenarioDefense>,
    #[serde(default)]
    pub threat: ThreatProfile,
    #[serde(default)]
    pub expansion: Option<ScenarioExpansion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFacility {
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub energy: u32,
    #[serde(default = "default_facility_capacity")]
    pub capacity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioNode {
    pub position: Position,
    /// Defaults to full.
    #[serde(default)]
    pub amount: Option<u32>,
    #[serde(default = "default_node_capacity")]
    pub capacity: u32,
    #[serde(default = "default_regen_amount")]
    pub regen_amount: u32,
    #[serde(default = "default_regen_interval")]
    pub regen_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStorage {
    pub kind: StorageKind,
    pub position: Position,
    #[serde(default)]
    pub amount: u32,
    pub capacity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRelay {
    pub position: Position,
    #[serde(default)]
    pub amount: u32,
    #[serde(default = "default_relay_capacity")]
    pub capacity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSite {
    pub kind: SiteKind,
    pub position: Position,
    #[serde(default)]
    pub progress: u32,
    #[serde(default = "default_site_required")]
    pub required: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDefense {
    pub position: Position,
    /// Defaults to undamaged.
    #[serde(default)]
    pub hits: Option<u32>,
    #[serde(default = "default_defense_hits")]
    pub max_hits: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioExpansion {
    pub name: String,
    pub position: Position,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Scenario::from_yaml(&data)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        Ok(scenario)
    }
}

fn check_table(name: &str, configs: &[RoleConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for config in configs {
        config
            .resolve_role()
            .with_context(|| format!("role table {name}"))?;
        config
            .validate_body()
            .with_context(|| format!("role table {name}"))?;
        ensure!(
            seen.insert(config.role.as_str()),
            "role table {name} lists role {} twice",
            config.role
        );
    }
    Ok(())
}

impl Scenario {
    pub fn from_yaml(data: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(data).context("Failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.zones.is_empty(), "scenario {} has no zones", self.name);
        let mut names = HashSet::new();
        for zone in &self.zones {
            ensure!(
                names.insert(zone.name.as_str()),
                "zone name {} is used twice",
                zone.name
            );
            let reservoirs = zone
                .storages
                .iter()
                .filter(|storage| storage.kind == StorageKind::Reservoir)
                .count();
            ensure!(
                reservoirs <= 1,
                "zone {} declares {reservoirs} reservoirs, at most one is allowed",
                zone.name
            );
        }
        if let Some(base) = &self.base_table {
            check_table("base", base)?;
        }
        for (state, configs) in &self.state_tables {
            check_table(state.as_str(), configs)?;
        }
        Ok(())
    }

    /// Table set shared by every zone of the scenario.
    pub fn table_set(&self) -> Result<TableSet> {
        let base = match &self.base_table {
            Some(configs) => RoleTable::new("base", ProductionStrategy::Balanced, configs.clone())?,
            None => default_base_table(),
        };
        let mut overrides = BTreeMap::new();
        for (state, configs) in &self.state_tables {
            let table = RoleTable::new(state.as_str(), state.strategy(), configs.clone())?;
            overrides.insert(*state, table);
        }
        Ok(TableSet::build(&base, &overrides)?)
    }

    pub fn build_colony(&self) -> Result<Colony> {
        let tables = self.table_set()?;
        let mut colony = Colony::new(self.config.clone());
        for layout in &self.zones {
            let zone = self.build_zone(&mut colony, layout, tables.clone())?;
            colony.insert_zone(zone);
        }
        Ok(colony)
    }

    fn build_zone(&self, colony: &mut Colony, layout: &ScenarioZone, tables: TableSet) -> Result<Zone> {
        let ids = colony.ids_mut();
        let in_bounds = |position: Position, what: &str| -> Result<()> {
            if !position.in_bounds() {
                bail!(
                    "zone {}: {what} at ({}, {}) lies outside the zone",
                    layout.name,
                    position.x,
                    position.y
                );
            }
            Ok(())
        };
        in_bounds(layout.hub, "hub")?;

        let facility = match &layout.facility {
            Some(facility) => {
                let position = facility.position.unwrap_or(layout.hub);
                in_bounds(position, "facility")?;
                Some(Facility {
                    id: ids.point(),
                    position,
                    energy: facility.energy.min(facility.capacity),
                    capacity: facility.capacity,
                    job: None,
                })
            }
            None => None,
        };

        let mut nodes = Vec::with_capacity(layout.nodes.len());
        for node in &layout.nodes {
            in_bounds(node.position, "resource node")?;
            nodes.push(ResourceNode {
                id: ids.point(),
                position: node.position,
                amount: node.amount.unwrap_or(node.capacity).min(node.capacity),
                capacity: node.capacity,
                regen_amount: node.regen_amount,
                regen_interval: node.regen_interval,
            });
        }

        let mut storages = Vec::with_capacity(layout.storages.len());
        for storage in &layout.storages {
            in_bounds(storage.position, "storage")?;
            storages.push(Storage {
                id: ids.point(),
                kind: storage.kind,
                position: storage.position,
                amount: storage.amount.min(storage.capacity),
                capacity: storage.capacity,
            });
        }

        let mut relays = Vec::with_capacity(layout.relays.len());
        for relay in &layout.relays {
            in_bounds(relay.position, "relay")?;
            relays.push(Relay {
                id: ids.point(),
                position: relay.position,
                amount: relay.amount.min(relay.capacity),
                capacity: relay.capacity,
                cooldown: 0,
            });
        }

        let sites = layout
            .sites
            .iter()
            .map(|site| ConstructionSite {
                id: ids.point(),
                kind: site.kind,
                position: site.position,
                progress: site.progress.min(site.required),
                required: site.required,
            })
            .collect();

        let defenses = layout
            .defenses
            .iter()
            .map(|defense| Defense {
                id: ids.point(),
                position: defense.position,
                hits: defense.hits.unwrap_or(defense.max_hits).min(defense.max_hits),
                max_hits: defense.max_hits,
            })
            .collect();

        let status = ZoneStatus::default();
        Ok(Zone {
            name: layout.name.clone(),
            level: layout.level,
            progress: layout.progress,
            hub: layout.hub,
            controller: layout.controller.unwrap_or(layout.hub),
            facility,
            nodes,
            storages,
            relays,
            sites,
            defenses,
            hostiles: Vec::new(),
            threat: layout.threat.clone(),
            expansion: layout.expansion.as_ref().map(|target| ExpansionTarget {
                name: target.name.clone(),
                position: target.position,
                claimed: false,
            }),
            status,
            tables,
            router: RelayNetwork::default(),
        })
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: minimal
seed: 3
zones:
  - name: home
    hub: { x: 25, y: 25 }
    facility: { energy: 300 }
    nodes:
      - position: { x: 30, y: 25 }
"#;

    #[test]
    fn minimal_scenario_builds_with_defaults() {
        let scenario = Scenario::from_yaml(MINIMAL).unwrap();
        assert_eq!(scenario.snapshot_interval_ticks, 25);
        assert_eq!(scenario.ticks(None), 200);
        assert_eq!(scenario.ticks(Some(7)), 7);

        let colony = scenario.build_colony().unwrap();
        let id = colony.zone_by_name("home").unwrap();
        let zone = colony.zone(id).unwrap();
        assert_eq!(zone.level, 1);
        assert_eq!(zone.controller, zone.hub);
        assert_eq!(zone.nodes[0].amount, 3_000);
        assert_eq!(zone.facility.as_ref().unwrap().capacity, 300);
        assert_eq!(zone.status.state, ZoneState::Normal);
    }

    #[test]
    fn rejects_empty_scenarios() {
        let err = Scenario::from_yaml("name: none\nseed: 1\nzones: []\n").unwrap_err();
        assert!(err.to_string().contains("no zones"));
    }

    #[test]
    fn rejects_duplicate_zone_names() {
        let yaml = r#"
name: twins
seed: 1
zones:
  - { name: a, hub: { x: 1, y: 1 } }
  - { name: a, hub: { x: 2, y: 2 } }
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("used twice"));
    }

    #[test]
    fn rejects_second_reservoir() {
        let yaml = r#"
name: hoard
seed: 1
zones:
  - name: a
    hub: { x: 1, y: 1 }
    storages:
      - { kind: reservoir, position: { x: 2, y: 2 }, capacity: 100 }
      - { kind: reservoir, position: { x: 3, y: 3 }, capacity: 100 }
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("reservoirs"));
    }

    #[test]
    fn rejects_unknown_and_duplicate_roles() {
        let unknown = r#"
name: odd
seed: 1
base_table:
  - { role: courier, body: { kind: fixed, parts: [carry, move] }, cap: 1, priority: 1 }
zones:
  - { name: a, hub: { x: 1, y: 1 } }
"#;
        let err = Scenario::from_yaml(unknown).unwrap_err();
        assert!(format!("{err:#}").contains("courier"));

        let duplicate = r#"
name: odd
seed: 1
state_tables:
  emergency:
    - { role: gatherer, body: { kind: fixed, parts: [work, carry, move] }, cap: 1, priority: 1 }
    - { role: gatherer, body: { kind: fixed, parts: [work, carry, move] }, cap: 2, priority: 2 }
zones:
  - { name: a, hub: { x: 1, y: 1 } }
"#;
        let err = Scenario::from_yaml(duplicate).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn state_override_replaces_derived_table() {
        let yaml = r#"
name: custom
seed: 1
state_tables:
  emergency:
    - { role: gatherer, body: { kind: fixed, parts: [work, carry, move] }, cap: 1, priority: 1 }
zones:
  - { name: a, hub: { x: 1, y: 1 }, level: 5 }
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let tables = scenario.table_set().unwrap();
        let table = tables.select(ZoneState::Emergency, 5);
        assert_eq!(table.id(), "emergency");
        assert_eq!(table.configs().len(), 1);
        assert_eq!(table.configs()[0].cap, 1);
    }

    #[test]
    fn rejects_positions_outside_the_zone() {
        let yaml = r#"
name: far
seed: 1
zones:
  - name: a
    hub: { x: 1, y: 1 }
    nodes:
      - position: { x: 80, y: 1 }
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let err = scenario.build_colony().unwrap_err();
        assert!(err.to_string().contains("outside"));
    }
}
