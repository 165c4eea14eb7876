//! Priority-ordered production scheduling
//!
//! One call considers the active role table once, finds the most urgent role
//! below its cap and makes at most one production attempt for it. Every
//! failure is terminal for the step; the next step starts over.

mod facility;

pub use facility::{FacilityError, FacilityHandle, ProductionFacility, SPAWN_TICKS_PER_PART};

use thiserror::Error;

use crate::{
    classifier::ProductionStrategy,
    population::PopulationSnapshot,
    roles::{BodySpec, ConfigurationError, Role, RoleTable},
    world::WorkerId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedWorker {
    pub worker: WorkerId,
    pub role: Role,
    pub body: BodySpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductionFailure {
    #[error("every role is at its population cap")]
    CapacityReached,
    #[error("facility busy, {role} waits")]
    FacilityBusy { role: Role },
    #[error("no production facility for {role}")]
    FacilityMissing { role: Role },
    #[error("{role} needs {needed} energy, pool holds {available}")]
    AwaitingEnergy {
        role: Role,
        needed: u32,
        available: u32,
    },
    #[error("facility rejected {role}: {source}")]
    BuildRejected {
        role: Role,
        #[source]
        source: FacilityError,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ProductionFailure {
    /// Failures an operator should hear about; the rest are steady state.
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            ProductionFailure::BuildRejected { .. } | ProductionFailure::Configuration(_)
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            ProductionFailure::CapacityReached => "capacity-reached",
            ProductionFailure::FacilityBusy { .. } => "facility-busy",
            ProductionFailure::FacilityMissing { .. } => "facility-missing",
            ProductionFailure::AwaitingEnergy { .. } => "awaiting-energy",
            ProductionFailure::BuildRejected { .. } => "build-rejected",
            ProductionFailure::Configuration(_) => "configuration-error",
        }
    }
}

pub type ProductionResult = Result<ProducedWorker, ProductionFailure>;

/// Energy a body may be sized against under `strategy`.
pub fn body_budget(strategy: ProductionStrategy, facility: &dyn ProductionFacility) -> u32 {
    match strategy {
        ProductionStrategy::Conservative => facility.energy_available(),
        ProductionStrategy::Balanced | ProductionStrategy::Aggressive => {
            facility.energy_capacity()
        }
    }
}

pub fn schedule_next(
    table: &RoleTable,
    population: &PopulationSnapshot,
    facility: Option<&mut dyn ProductionFacility>,
) -> ProductionResult {
    let mut chosen = None;
    for config in table.by_priority() {
        let role = config.resolve_role()?;
        if population.count(role) < config.cap {
            chosen = Some((role, config));
            break;
        }
    }
    let Some((role, config)) = chosen else {
        return Err(ProductionFailure::CapacityReached);
    };

    let Some(facility) = facility else {
        return Err(ProductionFailure::FacilityMissing { role });
    };
    if facility.is_busy() {
        return Err(ProductionFailure::FacilityBusy { role });
    }

    let budget = body_budget(table.strategy(), facility);
    let available = facility.energy_available();
    let Some(body) = config.body_for_budget(budget)? else {
        return Err(ProductionFailure::AwaitingEnergy {
            role,
            needed: budget,
            available,
        });
    };
    if body.cost() > available {
        return Err(ProductionFailure::AwaitingEnergy {
            role,
            needed: body.cost(),
            available,
        });
    }

    match facility.produce(&body, role) {
        Ok(worker) => Ok(ProducedWorker { worker, role, body }),
        Err(source) => Err(ProductionFailure::BuildRejected { role, source }),
    }
}
