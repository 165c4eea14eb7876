use anyhow::Result;
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::Colony,
};

const SUMMARY_INTERVAL: u64 = 50;

/// Keeps stocks within capacity and logs a periodic summary.
pub struct BookkeepingSystem;

impl BookkeepingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookkeepingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BookkeepingSystem {
    fn name(&self) -> &str {
        "bookkeeping"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        colony: &mut Colony,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        for zone in colony.zones.values_mut() {
            if let Some(facility) = zone.facility.as_mut() {
                facility.energy = facility.energy.min(facility.capacity);
            }
            for storage in &mut zone.storages {
                storage.amount = storage.amount.min(storage.capacity);
            }
            for relay in &mut zone.relays {
                relay.amount = relay.amount.min(relay.capacity);
            }
        }

        if ctx.tick % SUMMARY_INTERVAL == 0 {
            let ledger = &colony.ledger;
            debug!(
                "tick {}: {} workers, produced {}, expired {}, harvested {}, relay transfers {}",
                ctx.tick,
                colony.workers.len(),
                ledger.produced,
                ledger.expired,
                ledger.harvested,
                ledger.relay_transfers
            );
        }
        Ok(())
    }
}
