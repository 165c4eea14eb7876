//! Tunables shared by every zone controller

use serde::{Deserialize, Serialize};

use crate::assignment::AssignmentProfile;

fn default_state_check_interval() -> u64 {
    10
}

fn default_emergency_ratio() -> f64 {
    0.10
}

fn default_low_ratio() -> f64 {
    0.30
}

fn default_fortified_ratio() -> f64 {
    0.80
}

fn default_fortified_integrity() -> f64 {
    0.90
}

fn default_fortified_defenses() -> u32 {
    3
}

fn default_fortified_level() -> u32 {
    7
}

fn default_damaged_threshold() -> u32 {
    3
}

fn default_transfer_interval() -> u64 {
    3
}

fn default_source_radius() -> u32 {
    3
}

fn default_source_threshold() -> f64 {
    0.5
}

fn default_sink_threshold() -> f64 {
    0.7
}

fn default_min_transfer() -> u32 {
    100
}

fn default_transfer_loss() -> f64 {
    0.03
}

fn default_relay_cooldown() -> u32 {
    1
}

fn default_claim_level() -> u32 {
    4
}

fn default_worker_lifetime() -> u32 {
    1_500
}

fn default_claimer_lifetime() -> u32 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColonyConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub assignment: AssignmentConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub gating: GatingConfig,
    #[serde(default)]
    pub lifetimes: LifetimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds for the zone state decision order. Ratios are fractions of
/// the production pool capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_state_check_interval")]
    pub state_check_interval: u64,
    #[serde(default = "default_emergency_ratio")]
    pub emergency_ratio: f64,
    #[serde(default = "default_low_ratio")]
    pub low_ratio: f64,
    #[serde(default)]
    pub max_construction_sites: u32,
    #[serde(default = "default_fortified_ratio")]
    pub fortified_ratio: f64,
    #[serde(default = "default_fortified_integrity")]
    pub fortified_min_integrity: f64,
    #[serde(default = "default_fortified_defenses")]
    pub fortified_min_defenses: u32,
    #[serde(default = "default_fortified_level")]
    pub fortified_min_level: u32,
    #[serde(default = "default_damaged_threshold")]
    pub damaged_structures_threshold: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            state_check_interval: default_state_check_interval(),
            emergency_ratio: default_emergency_ratio(),
            low_ratio: default_low_ratio(),
            max_construction_sites: 0,
            fortified_ratio: default_fortified_ratio(),
            fortified_min_integrity: default_fortified_integrity(),
            fortified_min_defenses: default_fortified_defenses(),
            fortified_min_level: default_fortified_level(),
            damaged_structures_threshold: default_damaged_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    #[serde(default = "AssignmentProfile::gathering")]
    pub gathering: AssignmentProfile,
    #[serde(default = "AssignmentProfile::field_storage")]
    pub field_storage: AssignmentProfile,
    #[serde(default = "AssignmentProfile::relay")]
    pub relay: AssignmentProfile,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            gathering: AssignmentProfile::gathering(),
            field_storage: AssignmentProfile::field_storage(),
            relay: AssignmentProfile::relay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_transfer_interval")]
    pub transfer_interval: u64,
    #[serde(default = "default_source_radius")]
    pub source_radius: u32,
    #[serde(default = "default_source_threshold")]
    pub source_threshold: f64,
    #[serde(default = "default_sink_threshold")]
    pub sink_threshold: f64,
    #[serde(default = "default_min_transfer")]
    pub min_transfer: u32,
    /// Fraction of every transfer lost in transit.
    #[serde(default = "default_transfer_loss")]
    pub transfer_loss: f64,
    /// Steps a relay must rest after sending.
    #[serde(default = "default_relay_cooldown")]
    pub cooldown: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transfer_interval: default_transfer_interval(),
            source_radius: default_source_radius(),
            source_threshold: default_source_threshold(),
            sink_threshold: default_sink_threshold(),
            min_transfer: default_min_transfer(),
            transfer_loss: default_transfer_loss(),
            cooldown: default_relay_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingConfig {
    #[serde(default = "default_claim_level")]
    pub claim_min_level: u32,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            claim_min_level: default_claim_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifetimeConfig {
    #[serde(default = "default_worker_lifetime")]
    pub worker: u32,
    #[serde(default = "default_claimer_lifetime")]
    pub claimer: u32,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            worker: default_worker_lifetime(),
            claimer: default_claimer_lifetime(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
