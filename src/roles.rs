//! Worker roles, body plans and the per-state role tables

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{DevelopmentStage, ProductionStrategy, ZoneState};

pub const MAX_BODY_PARTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Gatherer,
    FieldHauler,
    ReservoirHauler,
    RelayHauler,
    Builder,
    Upgrader,
    Claimer,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Gatherer,
        Role::FieldHauler,
        Role::ReservoirHauler,
        Role::RelayHauler,
        Role::Builder,
        Role::Upgrader,
        Role::Claimer,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Role::Gatherer => "gatherer",
            Role::FieldHauler => "field-hauler",
            Role::ReservoirHauler => "reservoir-hauler",
            Role::RelayHauler => "relay-hauler",
            Role::Builder => "builder",
            Role::Upgrader => "upgrader",
            Role::Claimer => "claimer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Role {
    type Err = ConfigurationError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.tag() == tag)
            .ok_or_else(|| ConfigurationError::UnknownRole(tag.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown role tag `{0}`")]
    UnknownRole(String),
    #[error("malformed body for `{role}`: {reason}")]
    MalformedBody { role: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleTableError {
    #[error("role `{role}` appears more than once in table `{table}`")]
    DuplicateRole { table: String, role: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Work,
    Carry,
    Move,
    Claim,
}

impl BodyPart {
    pub fn cost(self) -> u32 {
        match self {
            BodyPart::Work => 100,
            BodyPart::Carry | BodyPart::Move => 50,
            BodyPart::Claim => 600,
        }
    }
}

/// Concrete body handed to the production facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySpec {
    parts: Vec<BodyPart>,
}

impl BodySpec {
    pub fn new(parts: Vec<BodyPart>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[BodyPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn cost(&self) -> u32 {
        self.parts.iter().map(|part| part.cost()).sum()
    }

    pub fn count(&self, part: BodyPart) -> u32 {
        self.parts.iter().filter(|p| **p == part).count() as u32
    }

    /// Energy the body can hold at once.
    pub fn carry_capacity(&self) -> u32 {
        self.count(BodyPart::Carry) * 50
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "parts")]
pub enum BodyPlan {
    /// Exactly these parts.
    Fixed(Vec<BodyPart>),
    /// Reference loadout, repeated when the budget allows and shrunk
    /// proportionally when it does not.
    Scaled(Vec<BodyPart>),
}

fn default_min_body_size() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Role tag, resolved at scheduling time.
    pub role: String,
    pub body: BodyPlan,
    pub cap: u32,
    /// Lower is more urgent.
    pub priority: i32,
    #[serde(default = "default_min_body_size")]
    pub min_body_size: usize,
}

impl RoleConfig {
    pub fn new(role: Role, body: BodyPlan, cap: u32, priority: i32, min_body_size: usize) -> Self {
        Self {
            role: role.tag().to_string(),
            body,
            cap,
            priority,
            min_body_size,
        }
    }

    pub fn resolve_role(&self) -> Result<Role, ConfigurationError> {
        self.role.parse()
    }

    fn malformed(&self, reason: &str) -> ConfigurationError {
        ConfigurationError::MalformedBody {
            role: self.role.clone(),
            reason: reason.to_string(),
        }
    }

    /// Checks the plan itself, independent of any budget.
    pub fn validate_body(&self) -> Result<(), ConfigurationError> {
        match &self.body {
            BodyPlan::Fixed(parts) | BodyPlan::Scaled(parts) if parts.is_empty() => {
                Err(self.malformed("no parts"))
            }
            BodyPlan::Fixed(parts) | BodyPlan::Scaled(parts) if parts.len() > MAX_BODY_PARTS => {
                Err(self.malformed("more than 50 parts"))
            }
            BodyPlan::Fixed(parts) if parts.len() < self.min_body_size => {
                Err(self.malformed("fewer parts than the minimum body size"))
            }
            _ if self.min_body_size > MAX_BODY_PARTS => {
                Err(self.malformed("minimum body size exceeds 50 parts"))
            }
            _ => Ok(()),
        }
    }

    /// Body affordable within `budget`, or `None` when the budget is too
    /// small for a body of at least the minimum size.
    pub fn body_for_budget(&self, budget: u32) -> Result<Option<BodySpec>, ConfigurationError> {
        self.validate_body()?;
        let body = match &self.body {
            BodyPlan::Fixed(parts) => BodySpec::new(parts.clone()),
            BodyPlan::Scaled(reference) => BodySpec::new(scale_body(reference, budget)),
        };
        if body.cost() > budget || body.len() < self.min_body_size {
            return Ok(None);
        }
        Ok(Some(body))
    }
}

fn scale_body(reference: &[BodyPart], budget: u32) -> Vec<BodyPart> {
    let reference_cost: u32 = reference.iter().map(|part| part.cost()).sum();
    if budget >= reference_cost {
        let repeats = (budget / reference_cost.max(1)) as usize;
        let repeats = repeats.min(MAX_BODY_PARTS / reference.len()).max(1);
        return reference
            .iter()
            .copied()
            .cycle()
            .take(reference.len() * repeats)
            .collect();
    }

    let mut counts: Vec<(BodyPart, u32)> = Vec::new();
    for part in reference {
        match counts.iter_mut().find(|(p, _)| p == part) {
            Some((_, count)) => *count += 1,
            None => counts.push((*part, 1)),
        }
    }
    let ratio = budget as f64 / reference_cost as f64;
    for (_, count) in counts.iter_mut() {
        *count = ((*count as f64 * ratio).floor() as u32).max(1);
    }
    let cost = |counts: &[(BodyPart, u32)]| -> u32 {
        counts.iter().map(|(part, count)| part.cost() * count).sum()
    };
    while cost(&counts) > budget {
        let mut largest: Option<usize> = None;
        for (index, (_, count)) in counts.iter().enumerate() {
            if *count > 1 && largest.map_or(true, |best| *count > counts[best].1) {
                largest = Some(index);
            }
        }
        match largest {
            Some(index) => counts[index].1 -= 1,
            None => break,
        }
    }
    counts
        .into_iter()
        .flat_map(|(part, count)| std::iter::repeat(part).take(count as usize))
        .collect()
}

/// Named set of role configs; no two configs share a role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleTable {
    id: String,
    strategy: ProductionStrategy,
    configs: Vec<RoleConfig>,
}

impl RoleTable {
    pub fn new(
        id: impl Into<String>,
        strategy: ProductionStrategy,
        configs: Vec<RoleConfig>,
    ) -> Result<Self, RoleTableError> {
        let id = id.into();
        for (index, config) in configs.iter().enumerate() {
            if configs[..index].iter().any(|other| other.role == config.role) {
                return Err(RoleTableError::DuplicateRole {
                    table: id,
                    role: config.role.clone(),
                });
            }
        }
        Ok(Self {
            id,
            strategy,
            configs,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn strategy(&self) -> ProductionStrategy {
        self.strategy
    }

    pub fn configs(&self) -> &[RoleConfig] {
        &self.configs
    }

    pub fn get(&self, role: Role) -> Option<&RoleConfig> {
        self.configs.iter().find(|config| config.role == role.tag())
    }

    /// Configs ordered by priority; equal priorities keep declaration order.
    pub fn by_priority(&self) -> Vec<&RoleConfig> {
        let mut ordered: Vec<&RoleConfig> = self.configs.iter().collect();
        ordered.sort_by_key(|config| config.priority);
        ordered
    }

    /// Copy keeping only the configs `keep` accepts.
    pub fn filtered(&self, keep: impl Fn(&RoleConfig) -> bool) -> RoleTable {
        self.derive(self.id.clone(), self.strategy, |config| {
            keep(config).then(|| config.clone())
        })
    }

    fn derive(
        &self,
        id: String,
        strategy: ProductionStrategy,
        transform: impl Fn(&RoleConfig) -> Option<RoleConfig>,
    ) -> RoleTable {
        RoleTable {
            id,
            strategy,
            configs: self.configs.iter().filter_map(transform).collect(),
        }
    }
}

fn is(config: &RoleConfig, role: Role) -> bool {
    config.role == role.tag()
}

/// Shapes the base table for early development: no reservoir hauling and a
/// larger gathering crew.
fn adjust_for_stage(base: &RoleTable, stage: DevelopmentStage) -> RoleTable {
    if stage != DevelopmentStage::Early {
        return base.clone();
    }
    base.derive(base.id.clone(), base.strategy, |config| {
        let mut config = config.clone();
        if is(&config, Role::ReservoirHauler) {
            config.cap = 0;
        } else if is(&config, Role::Gatherer) {
            config.cap = config.cap.max(5);
        }
        Some(config)
    })
}

/// Derived table for `state`, `None` when the state has no table of its own.
fn derive_for_state(base: &RoleTable, state: ZoneState, id: String) -> Option<RoleTable> {
    let strategy = state.strategy();
    let table = match state {
        ZoneState::Normal => base.derive(id, strategy, |config| Some(config.clone())),
        ZoneState::Developing => base.derive(id, strategy, |config| {
            let mut config = config.clone();
            if is(&config, Role::Builder) {
                config.cap = ((config.cap as f64 * 1.5).round() as u32).max(2);
            }
            Some(config)
        }),
        ZoneState::LowResource => base.derive(id, strategy, |config| {
            let keep = [Role::Gatherer, Role::FieldHauler, Role::RelayHauler]
                .into_iter()
                .any(|role| is(config, role));
            keep.then(|| config.clone())
        }),
        ZoneState::UnderThreat => base.derive(id, strategy, |config| {
            let mut config = config.clone();
            if is(&config, Role::Builder) {
                config.cap /= 2;
            }
            Some(config)
        }),
        ZoneState::Emergency => base.derive(id, strategy, |config| {
            is(config, Role::Gatherer).then(|| {
                let mut config = config.clone();
                config.cap = config.cap.min(2);
                config
            })
        }),
        ZoneState::Fortified => return None,
    };
    Some(table)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum StageKey {
    Early,
    Developed,
}

impl From<DevelopmentStage> for StageKey {
    fn from(stage: DevelopmentStage) -> Self {
        match stage {
            DevelopmentStage::Early => StageKey::Early,
            _ => StageKey::Developed,
        }
    }
}

/// Every state's table, built once from a base table. Lookups fall back to
/// the normal table when a state has none.
#[derive(Debug, Clone)]
pub struct TableSet {
    tables: BTreeMap<(ZoneState, StageKey), RoleTable>,
    normal: RoleTable,
    normal_early: RoleTable,
}

impl TableSet {
    pub fn build(
        base: &RoleTable,
        overrides: &BTreeMap<ZoneState, RoleTable>,
    ) -> Result<Self, RoleTableError> {
        let mut tables = BTreeMap::new();
        for (key, stage) in [
            (StageKey::Early, DevelopmentStage::Early),
            (StageKey::Developed, DevelopmentStage::Late),
        ] {
            let shaped = adjust_for_stage(base, stage);
            for state in ZoneState::ALL {
                let table = match overrides.get(&state) {
                    Some(table) => Some(table.clone()),
                    None => {
                        let id = match key {
                            StageKey::Early => format!("{}:early", state.as_str()),
                            StageKey::Developed => state.as_str().to_string(),
                        };
                        derive_for_state(&shaped, state, id)
                    }
                };
                if let Some(table) = table {
                    tables.insert((state, key), table);
                }
            }
        }
        let empty = RoleTable::new("normal", ProductionStrategy::Balanced, Vec::new())?;
        let normal = tables
            .remove(&(ZoneState::Normal, StageKey::Developed))
            .unwrap_or_else(|| empty.clone());
        let normal_early = tables
            .remove(&(ZoneState::Normal, StageKey::Early))
            .unwrap_or(empty);
        Ok(Self {
            tables,
            normal,
            normal_early,
        })
    }

    pub fn from_base(base: &RoleTable) -> Result<Self, RoleTableError> {
        Self::build(base, &BTreeMap::new())
    }

    pub fn select(&self, state: ZoneState, level: u32) -> &RoleTable {
        let key = StageKey::from(DevelopmentStage::from_level(level));
        let normal = match key {
            StageKey::Early => &self.normal_early,
            StageKey::Developed => &self.normal,
        };
        self.tables.get(&(state, key)).unwrap_or(normal)
    }

    pub fn has_table(&self, state: ZoneState) -> bool {
        state == ZoneState::Normal
            || self
                .tables
                .keys()
                .any(|(table_state, _)| *table_state == state)
    }
}

/// Role table used when a scenario does not provide one.
pub fn default_base_table() -> RoleTable {
    use BodyPart::{Carry, Claim, Move, Work};

    let configs = vec![
        RoleConfig::new(
            Role::Gatherer,
            BodyPlan::Scaled(vec![Work, Work, Carry, Move]),
            4,
            1,
            3,
        ),
        RoleConfig::new(
            Role::RelayHauler,
            BodyPlan::Scaled(vec![Carry, Carry, Move]),
            1,
            2,
            2,
        ),
        RoleConfig::new(
            Role::FieldHauler,
            BodyPlan::Scaled(vec![Carry, Carry, Move, Move]),
            2,
            3,
            2,
        ),
        RoleConfig::new(
            Role::ReservoirHauler,
            BodyPlan::Scaled(vec![Carry, Carry, Move, Move]),
            1,
            4,
            2,
        ),
        RoleConfig::new(
            Role::Builder,
            BodyPlan::Scaled(vec![Work, Carry, Move]),
            3,
            5,
            3,
        ),
        RoleConfig::new(
            Role::Upgrader,
            BodyPlan::Scaled(vec![Work, Carry, Move]),
            2,
            6,
            3,
        ),
        RoleConfig::new(Role::Claimer, BodyPlan::Fixed(vec![Claim, Move]), 1, 7, 2),
    ];
    RoleTable {
        id: "base".to_string(),
        strategy: ProductionStrategy::Balanced,
        configs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BodyPart::{Carry, Move, Work};

    fn caps(table: &RoleTable) -> Vec<(String, u32)> {
        table
            .configs()
            .iter()
            .map(|config| (config.role.clone(), config.cap))
            .collect()
    }

    #[test]
    fn tags_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.tag().parse::<Role>().unwrap(), role);
        }
        assert_eq!(
            "miner".parse::<Role>(),
            Err(ConfigurationError::UnknownRole("miner".into()))
        );
    }

    #[test]
    fn duplicate_roles_are_rejected() {
        let gatherer = RoleConfig::new(Role::Gatherer, BodyPlan::Fixed(vec![Work]), 1, 1, 1);
        let err = RoleTable::new(
            "twice",
            ProductionStrategy::Balanced,
            vec![gatherer.clone(), gatherer],
        )
        .unwrap_err();
        assert_eq!(
            err,
            RoleTableError::DuplicateRole {
                table: "twice".into(),
                role: "gatherer".into()
            }
        );
    }

    #[test]
    fn priority_ties_keep_declaration_order() {
        let configs = vec![
            RoleConfig::new(Role::Upgrader, BodyPlan::Fixed(vec![Work]), 1, 3, 1),
            RoleConfig::new(Role::Builder, BodyPlan::Fixed(vec![Work]), 1, 2, 1),
            RoleConfig::new(Role::Gatherer, BodyPlan::Fixed(vec![Work]), 1, 3, 1),
        ];
        let table = RoleTable::new("t", ProductionStrategy::Balanced, configs).unwrap();
        let order: Vec<&str> = table
            .by_priority()
            .into_iter()
            .map(|config| config.role.as_str())
            .collect();
        assert_eq!(order, vec!["builder", "upgrader", "gatherer"]);
    }

    #[test]
    fn scaled_body_repeats_and_shrinks() {
        let config = RoleConfig::new(
            Role::Gatherer,
            BodyPlan::Scaled(vec![Work, Work, Carry, Move]),
            1,
            1,
            3,
        );
        let full = config.body_for_budget(600).unwrap().unwrap();
        assert_eq!(full.len(), 8);
        assert_eq!(full.cost(), 600);

        let shrunk = config.body_for_budget(250).unwrap().unwrap();
        assert_eq!(shrunk.parts(), &[Work, Carry, Move]);

        assert_eq!(config.body_for_budget(150).unwrap(), None);
    }

    #[test]
    fn scaled_body_never_exceeds_part_limit() {
        let config = RoleConfig::new(Role::Builder, BodyPlan::Scaled(vec![Carry, Move]), 1, 1, 2);
        let body = config.body_for_budget(1_000_000).unwrap().unwrap();
        assert_eq!(body.len(), MAX_BODY_PARTS);
    }

    #[test]
    fn malformed_fixed_body() {
        let config = RoleConfig::new(Role::Builder, BodyPlan::Fixed(vec![Work]), 1, 1, 3);
        assert!(matches!(
            config.body_for_budget(1_000),
            Err(ConfigurationError::MalformedBody { .. })
        ));
        let empty = RoleConfig::new(Role::Builder, BodyPlan::Scaled(vec![]), 1, 1, 1);
        assert!(empty.validate_body().is_err());
    }

    #[test]
    fn state_tables_are_pure_transforms() {
        let base = default_base_table();
        let set = TableSet::from_base(&base).unwrap();

        let developing = set.select(ZoneState::Developing, 5);
        assert_eq!(developing.id(), "developing");
        assert_eq!(developing.get(Role::Builder).unwrap().cap, 5);
        assert_eq!(developing.strategy(), ProductionStrategy::Aggressive);

        let threat = set.select(ZoneState::UnderThreat, 5);
        assert_eq!(threat.get(Role::Builder).unwrap().cap, 1);

        let low = set.select(ZoneState::LowResource, 5);
        assert!(low.get(Role::Builder).is_none());
        assert!(low.get(Role::FieldHauler).is_some());

        let emergency = set.select(ZoneState::Emergency, 5);
        assert_eq!(
            caps(emergency),
            vec![("gatherer".to_string(), 2)]
        );

        // base table untouched
        assert_eq!(base.get(Role::Builder).unwrap().cap, 3);
    }

    #[test]
    fn fortified_falls_back_to_normal() {
        let set = TableSet::from_base(&default_base_table()).unwrap();
        assert!(!set.has_table(ZoneState::Fortified));
        assert_eq!(set.select(ZoneState::Fortified, 8).id(), "normal");
    }

    #[test]
    fn early_stage_reshapes_tables() {
        let set = TableSet::from_base(&default_base_table()).unwrap();
        let early = set.select(ZoneState::Normal, 2);
        assert_eq!(early.id(), "normal:early");
        assert_eq!(early.get(Role::Gatherer).unwrap().cap, 5);
        assert_eq!(early.get(Role::ReservoirHauler).unwrap().cap, 0);

        // emergency still collapses to two gatherers
        let emergency = set.select(ZoneState::Emergency, 2);
        assert_eq!(emergency.get(Role::Gatherer).unwrap().cap, 2);
    }

    #[test]
    fn overrides_replace_derived_tables() {
        let custom = RoleTable::new(
            "siege",
            ProductionStrategy::Conservative,
            vec![RoleConfig::new(
                Role::Builder,
                BodyPlan::Fixed(vec![Work, Carry, Move]),
                1,
                1,
                3,
            )],
        )
        .unwrap();
        let overrides = BTreeMap::from([(ZoneState::Fortified, custom)]);
        let set = TableSet::build(&default_base_table(), &overrides).unwrap();
        assert_eq!(set.select(ZoneState::Fortified, 8).id(), "siege");
        assert_eq!(set.select(ZoneState::Fortified, 1).id(), "siege");
    }
}
