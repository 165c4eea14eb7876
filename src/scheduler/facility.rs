//! Production facility seam

use thiserror::Error;

use crate::{
    roles::{BodySpec, Role, MAX_BODY_PARTS},
    world::{Facility, IdAllocator, SpawnJob, WorkerId},
};

/// Steps a facility spends per body part.
pub const SPAWN_TICKS_PER_PART: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacilityError {
    #[error("facility is already producing")]
    Busy,
    #[error("body costs {needed} but only {available} energy is pooled")]
    InsufficientEnergy { needed: u32, available: u32 },
    #[error("invalid body: {0}")]
    InvalidBody(String),
}

/// Single-issue production unit.
pub trait ProductionFacility {
    fn is_busy(&self) -> bool;
    fn energy_available(&self) -> u32;
    fn energy_capacity(&self) -> u32;
    fn produce(&mut self, body: &BodySpec, role: Role) -> Result<WorkerId, FacilityError>;
}

/// Borrowed view of a zone facility that starts spawn jobs.
pub struct FacilityHandle<'a> {
    facility: &'a mut Facility,
    ids: &'a mut IdAllocator,
}

impl<'a> FacilityHandle<'a> {
    pub fn new(facility: &'a mut Facility, ids: &'a mut IdAllocator) -> Self {
        Self { facility, ids }
    }
}

impl ProductionFacility for FacilityHandle<'_> {
    fn is_busy(&self) -> bool {
        self.facility.job.is_some()
    }

    fn energy_available(&self) -> u32 {
        self.facility.energy
    }

    fn energy_capacity(&self) -> u32 {
        self.facility.capacity
    }

    fn produce(&mut self, body: &BodySpec, role: Role) -> Result<WorkerId, FacilityError> {
        if self.is_busy() {
            return Err(FacilityError::Busy);
        }
        if body.is_empty() || body.len() > MAX_BODY_PARTS {
            return Err(FacilityError::InvalidBody(format!(
                "{} parts",
                body.len()
            )));
        }
        let needed = body.cost();
        if needed > self.facility.energy {
            return Err(FacilityError::InsufficientEnergy {
                needed,
                available: self.facility.energy,
            });
        }
        self.facility.energy -= needed;
        let worker = self.ids.worker();
        self.facility.job = Some(SpawnJob {
            worker,
            role,
            body: body.clone(),
            remaining: body.len() as u32 * SPAWN_TICKS_PER_PART,
        });
        Ok(worker)
    }
}
