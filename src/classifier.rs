//! Zone state classification
//!
//! States are recomputed from scratch on every evaluation. The only memory
//! a zone keeps between evaluations is when it was last classified, which
//! enforces the minimum re-evaluation interval.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;

/// Live measurements of a zone, refreshed before each classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneMetrics {
    pub energy_stored: u32,
    pub energy_capacity: u32,
    pub hostile_present: bool,
    pub hostile_power: u32,
    pub open_construction_sites: u32,
    pub damaged_structure_count: u32,
    pub development_level: u32,
    pub defensive_structures: u32,
    /// Mean hit-point fraction of defensive structures, 1.0 when there are none.
    pub defensive_integrity: f64,
}

impl ZoneMetrics {
    pub fn energy_ratio(&self) -> f64 {
        self.energy_stored as f64 / self.energy_capacity.max(1) as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    Normal,
    Developing,
    LowResource,
    UnderThreat,
    Emergency,
    Fortified,
}

impl ZoneState {
    pub const ALL: [ZoneState; 6] = [
        ZoneState::Normal,
        ZoneState::Developing,
        ZoneState::LowResource,
        ZoneState::UnderThreat,
        ZoneState::Emergency,
        ZoneState::Fortified,
    ];

    pub fn strategy(self) -> ProductionStrategy {
        match self {
            ZoneState::Developing => ProductionStrategy::Aggressive,
            ZoneState::LowResource | ZoneState::UnderThreat | ZoneState::Emergency => {
                ProductionStrategy::Conservative
            }
            ZoneState::Normal | ZoneState::Fortified => ProductionStrategy::Balanced,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneState::Normal => "normal",
            ZoneState::Developing => "developing",
            ZoneState::LowResource => "low_resource",
            ZoneState::UnderThreat => "under_threat",
            ZoneState::Emergency => "emergency",
            ZoneState::Fortified => "fortified",
        }
    }
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStrategy {
    Aggressive,
    Conservative,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentStage {
    Early,
    Mid,
    Late,
}

impl DevelopmentStage {
    pub fn from_level(level: u32) -> Self {
        match level {
            0..=3 => DevelopmentStage::Early,
            4..=6 => DevelopmentStage::Mid,
            _ => DevelopmentStage::Late,
        }
    }
}

/// First matching rule wins; the order is the policy.
pub fn classify(metrics: &ZoneMetrics, thresholds: &ClassifierConfig) -> ZoneState {
    let ratio = metrics.energy_ratio();
    if ratio < thresholds.emergency_ratio {
        return ZoneState::Emergency;
    }
    if metrics.hostile_present {
        return ZoneState::UnderThreat;
    }
    if ratio < thresholds.low_ratio {
        return ZoneState::LowResource;
    }
    if metrics.open_construction_sites > thresholds.max_construction_sites {
        return ZoneState::Developing;
    }
    if is_fortified(metrics, thresholds) {
        return ZoneState::Fortified;
    }
    ZoneState::Normal
}

fn is_fortified(metrics: &ZoneMetrics, thresholds: &ClassifierConfig) -> bool {
    metrics.development_level >= thresholds.fortified_min_level
        && metrics.energy_ratio() > thresholds.fortified_ratio
        && metrics.defensive_integrity > thresholds.fortified_min_integrity
        && metrics.defensive_structures >= thresholds.fortified_min_defenses
}

/// Per-zone classification record; this is also the persisted zone layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub state: ZoneState,
    pub last_classified_step: Option<u64>,
    pub role_table_id: String,
}

impl Default for ZoneStatus {
    fn default() -> Self {
        Self {
            state: ZoneState::Normal,
            last_classified_step: None,
            role_table_id: ZoneState::Normal.as_str().to_string(),
        }
    }
}

impl ZoneStatus {
    pub fn is_due(&self, step: u64, interval: u64) -> bool {
        match self.last_classified_step {
            None => true,
            Some(last) => step.saturating_sub(last) >= interval,
        }
    }

    /// Reclassifies when the interval has elapsed. Returns the previous state
    /// when the state changed.
    pub fn refresh(
        &mut self,
        step: u64,
        metrics: &ZoneMetrics,
        thresholds: &ClassifierConfig,
    ) -> Option<ZoneState> {
        if !self.is_due(step, thresholds.state_check_interval) {
            return None;
        }
        let previous = self.state;
        let first = self.last_classified_step.is_none();
        self.state = classify(metrics, thresholds);
        self.last_classified_step = Some(step);
        (first || previous != self.state).then_some(previous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyKind {
    Energy,
    Security,
    Facility,
    Workforce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyReport {
    pub kind: EmergencyKind,
    pub severity: Severity,
}

/// Diagnoses the most pressing emergency for reporting collaborators. Energy
/// severity bands are fractions of the classifier's emergency ratio.
pub fn detect_emergency(
    metrics: &ZoneMetrics,
    facility_present: bool,
    population: usize,
    operational_defenses: u32,
    config: &ClassifierConfig,
) -> Option<EmergencyReport> {
    let ratio = metrics.energy_ratio();
    let threshold = config.emergency_ratio;
    if ratio < threshold {
        let severity = if ratio < threshold * 0.5 {
            Severity::Critical
        } else if ratio < threshold * 0.8 {
            Severity::High
        } else {
            Severity::Medium
        };
        return Some(EmergencyReport {
            kind: EmergencyKind::Energy,
            severity,
        });
    }
    if metrics.hostile_present && metrics.hostile_power > 3 {
        let severity = if metrics.hostile_power > 10 || operational_defenses == 0 {
            Severity::Critical
        } else if metrics.hostile_power > 5 {
            Severity::High
        } else {
            Severity::Medium
        };
        return Some(EmergencyReport {
            kind: EmergencyKind::Security,
            severity,
        });
    }
    if metrics.development_level > 0 && !facility_present {
        return Some(EmergencyReport {
            kind: EmergencyKind::Facility,
            severity: Severity::Critical,
        });
    }
    if metrics.development_level > 0 && population == 0 {
        return Some(EmergencyReport {
            kind: EmergencyKind::Workforce,
            severity: Severity::High,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(stored: u32, capacity: u32) -> ZoneMetrics {
        ZoneMetrics {
            energy_stored: stored,
            energy_capacity: capacity,
            development_level: 3,
            defensive_integrity: 1.0,
            ..ZoneMetrics::default()
        }
    }

    #[test]
    fn emergency_outranks_threat() {
        let mut m = metrics(5, 100);
        m.hostile_present = true;
        m.open_construction_sites = 4;
        assert_eq!(
            classify(&m, &ClassifierConfig::default()),
            ZoneState::Emergency
        );
    }

    #[test]
    fn threat_outranks_low_resource_and_developing() {
        let mut m = metrics(20, 100);
        m.hostile_present = true;
        m.open_construction_sites = 2;
        assert_eq!(
            classify(&m, &ClassifierConfig::default()),
            ZoneState::UnderThreat
        );
        m.hostile_present = false;
        assert_eq!(
            classify(&m, &ClassifierConfig::default()),
            ZoneState::LowResource
        );
    }

    #[test]
    fn any_construction_site_means_developing() {
        let mut m = metrics(50, 100);
        assert_eq!(classify(&m, &ClassifierConfig::default()), ZoneState::Normal);
        m.open_construction_sites = 1;
        assert_eq!(
            classify(&m, &ClassifierConfig::default()),
            ZoneState::Developing
        );
    }

    #[test]
    fn fortified_requires_late_development_and_defenses() {
        let thresholds = ClassifierConfig::default();
        let mut m = metrics(90, 100);
        m.defensive_structures = 3;
        m.defensive_integrity = 0.95;
        assert_eq!(classify(&m, &thresholds), ZoneState::Normal);
        m.development_level = 7;
        assert_eq!(classify(&m, &thresholds), ZoneState::Fortified);
        m.defensive_integrity = 0.5;
        assert_eq!(classify(&m, &thresholds), ZoneState::Normal);
    }

    #[test]
    fn zero_capacity_is_total() {
        let m = metrics(0, 0);
        assert_eq!(
            classify(&m, &ClassifierConfig::default()),
            ZoneState::Emergency
        );
    }

    #[test]
    fn refresh_honours_interval() {
        let thresholds = ClassifierConfig::default();
        let mut status = ZoneStatus::default();
        assert!(status.refresh(0, &metrics(50, 100), &thresholds).is_some());
        assert_eq!(status.last_classified_step, Some(0));

        // energy collapses but the interval has not elapsed yet
        assert!(status.refresh(5, &metrics(1, 100), &thresholds).is_none());
        assert_eq!(status.state, ZoneState::Normal);

        assert_eq!(
            status.refresh(10, &metrics(1, 100), &thresholds),
            Some(ZoneState::Normal)
        );
        assert_eq!(status.state, ZoneState::Emergency);
        assert!(status.refresh(20, &metrics(1, 100), &thresholds).is_none());
    }

    #[test]
    fn strategies() {
        assert_eq!(
            ZoneState::Developing.strategy(),
            ProductionStrategy::Aggressive
        );
        assert_eq!(
            ZoneState::Emergency.strategy(),
            ProductionStrategy::Conservative
        );
        assert_eq!(ZoneState::Normal.strategy(), ProductionStrategy::Balanced);
    }

    #[test]
    fn emergency_diagnosis_order() {
        let cfg = ClassifierConfig::default();
        let m = metrics(4, 100);
        let report = detect_emergency(&m, true, 3, 1, &cfg).unwrap();
        assert_eq!(report.kind, EmergencyKind::Energy);
        assert_eq!(report.severity, Severity::Critical);

        let mut m = metrics(50, 100);
        m.hostile_present = true;
        m.hostile_power = 6;
        let report = detect_emergency(&m, true, 3, 2, &cfg).unwrap();
        assert_eq!(report.kind, EmergencyKind::Security);
        assert_eq!(report.severity, Severity::High);

        let m = metrics(50, 100);
        assert_eq!(
            detect_emergency(&m, false, 3, 0, &cfg).map(|r| r.kind),
            Some(EmergencyKind::Facility)
        );
        assert_eq!(
            detect_emergency(&m, true, 0, 0, &cfg).map(|r| r.kind),
            Some(EmergencyKind::Workforce)
        );
        assert!(detect_emergency(&m, true, 4, 0, &cfg).is_none());
    }

    #[test]
    fn energy_emergency_follows_configured_ratio() {
        let m = metrics(15, 100);
        let default = ClassifierConfig::default();
        assert!(detect_emergency(&m, true, 3, 0, &default).is_none());
        assert_eq!(classify(&m, &default), ZoneState::LowResource);

        let raised = ClassifierConfig {
            emergency_ratio: 0.2,
            ..ClassifierConfig::default()
        };
        assert_eq!(classify(&m, &raised), ZoneState::Emergency);
        let report = detect_emergency(&m, true, 3, 0, &raised).unwrap();
        assert_eq!(report.kind, EmergencyKind::Energy);
        assert_eq!(report.severity, Severity::High);
    }

    #[test]
    fn stages() {
        assert_eq!(DevelopmentStage::from_level(3), DevelopmentStage::Early);
        assert_eq!(DevelopmentStage::from_level(6), DevelopmentStage::Mid);
        assert_eq!(DevelopmentStage::from_level(8), DevelopmentStage::Late);
    }
}
