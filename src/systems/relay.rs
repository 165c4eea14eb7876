use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::Colony,
};

pub struct RelaySystem;

impl RelaySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RelaySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for RelaySystem {
    fn name(&self) -> &str {
        "relay"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        colony: &mut Colony,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        for id in colony.zone_ids() {
            let Some(zone) = colony.zones.get_mut(&id) else {
                continue;
            };
            let nodes = zone.node_positions();
            let outcome = zone.router.route_energy(
                &zone.name,
                ctx.tick,
                &mut zone.relays,
                &nodes,
                zone.hub,
                &colony.config.relay,
            );
            colony.ledger.relay_transfers += outcome.transfers().len() as u64;
        }
        Ok(())
    }
}
