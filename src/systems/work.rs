use anyhow::Result;
use tracing::{debug, info};

use crate::{
    behavior::{perform, Activity, GridMovement},
    engine::{System, SystemContext},
    rng::SystemRng,
    world::Colony,
};

/// Executes one step of every live worker in worker id order.
pub struct WorkSystem {
    movement: GridMovement,
}

impl WorkSystem {
    pub fn new() -> Self {
        Self {
            movement: GridMovement,
        }
    }
}

impl Default for WorkSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for WorkSystem {
    fn name(&self) -> &str {
        "work"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        colony: &mut Colony,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let Colony {
            zones,
            workers,
            config,
            ledger,
            ..
        } = colony;

        let mut ids: Vec<_> = workers.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Some(worker) = workers.get_mut(&id) else {
                continue;
            };
            let Some(zone) = zones.get_mut(&worker.home_zone) else {
                continue;
            };
            let previous_wait = worker.wait;
            match perform(worker, zone, &mut self.movement, &config.relay) {
                Activity::Harvested(amount) => ledger.harvested += amount as u64,
                Activity::Built {
                    completed: Some(kind),
                    ..
                } => {
                    info!("zone {}: {kind:?} construction completed", zone.name);
                    ledger.sites_completed += 1;
                }
                Activity::Upgraded {
                    leveled_up: true, ..
                } => {
                    info!("zone {}: reached level {}", zone.name, zone.level);
                    ledger.level_ups += 1;
                }
                Activity::Claimed => {
                    if let Some(target) = zone.expansion.as_ref() {
                        info!("zone {}: claimed {}", zone.name, target.name);
                    }
                    ledger.claims += 1;
                }
                Activity::Waiting(state) if previous_wait != Some(state) => {
                    debug!("zone {}: {} {} waiting ({state:?})", zone.name, worker.role, worker.id);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::Position,
        rng::RngManager,
        roles::{BodyPart, BodySpec, Role},
        scenario::Scenario,
        world::WorkerUnit,
    };

    #[test]
    fn gatherer_harvests_its_bound_node() {
        let yaml = r#"
name: field
seed: 1
zones:
  - name: home
    hub: { x: 10, y: 10 }
    facility: { energy: 0 }
    nodes:
      - { position: { x: 12, y: 10 }, amount: 100 }
"#;
        let mut colony = Scenario::from_yaml(yaml).unwrap().build_colony().unwrap();
        let zone_id = colony.zone_ids()[0];
        let node = colony.zone(zone_id).unwrap().nodes[0].id;
        let worker_id = colony.ids_mut().worker();
        colony.insert_worker(WorkerUnit {
            id: worker_id,
            role: Role::Gatherer,
            home_zone: zone_id,
            body: BodySpec::new(vec![BodyPart::Work, BodyPart::Work, BodyPart::Carry, BodyPart::Move]),
            position: Position::new(11, 10),
            load: 0,
            binding: Some(node),
            lifetime: 100,
            delivering: false,
            wait: None,
        });

        let mut manager = RngManager::new(1);
        let ctx = SystemContext {
            tick: 0,
            scenario_name: "field",
        };
        WorkSystem::new()
            .run(&ctx, &mut colony, &mut manager.stream("work"))
            .unwrap();

        assert_eq!(colony.worker(worker_id).unwrap().load, 4);
        assert_eq!(colony.zone(zone_id).unwrap().nodes[0].amount, 96);
        assert_eq!(colony.ledger().harvested, 4);
    }
}
