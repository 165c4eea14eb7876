use anyhow::Result;

use crate::{
    controller::run_zone_step,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::Colony,
};

/// Runs the per-zone control loop in zone id order.
pub struct ControllerSystem;

impl ControllerSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ControllerSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ControllerSystem {
    fn name(&self) -> &str {
        "controller"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        colony: &mut Colony,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        for id in colony.zone_ids() {
            run_zone_step(colony, id, ctx.tick);
        }
        Ok(())
    }
}
