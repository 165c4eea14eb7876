use anyhow::Result;
use tracing::info;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    roles::Role,
    world::{Colony, WorkerUnit},
};

/// Finishes production jobs and retires workers at the end of their lifetime.
pub struct PopulationSystem;

impl PopulationSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PopulationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for PopulationSystem {
    fn name(&self) -> &str {
        "population"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        colony: &mut Colony,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        for id in colony.worker_ids() {
            let Some(worker) = colony.workers.get_mut(&id) else {
                continue;
            };
            worker.lifetime = worker.lifetime.saturating_sub(1);
            if worker.lifetime == 0 {
                if let Some(worker) = colony.workers.remove(&id) {
                    info!("{} {} expired", worker.role, worker.id);
                    colony.ledger.expired += 1;
                }
            }
        }

        let lifetimes = colony.config.lifetimes.clone();
        let mut finished = Vec::new();
        for zone_id in colony.zone_ids() {
            let Some(zone) = colony.zones.get_mut(&zone_id) else {
                continue;
            };
            let Some(facility) = zone.facility.as_mut() else {
                continue;
            };
            let done = match facility.job.as_mut() {
                Some(job) if job.remaining > 1 => {
                    job.remaining -= 1;
                    false
                }
                Some(_) => true,
                None => false,
            };
            if !done {
                continue;
            }
            if let Some(job) = facility.job.take() {
                info!("zone {}: {} {} ready", zone.name, job.role, job.worker);
                let lifetime = match job.role {
                    Role::Claimer => lifetimes.claimer,
                    _ => lifetimes.worker,
                };
                finished.push(WorkerUnit {
                    id: job.worker,
                    role: job.role,
                    home_zone: zone_id,
                    body: job.body,
                    position: facility.position,
                    load: 0,
                    binding: None,
                    lifetime,
                    delivering: false,
                    wait: None,
                });
            }
        }
        for worker in finished {
            colony.insert_worker(worker);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rng::RngManager,
        roles::{BodyPart, BodySpec},
        scenario::Scenario,
        world::SpawnJob,
    };

    fn run(colony: &mut Colony) {
        let mut manager = RngManager::new(1);
        let ctx = SystemContext {
            tick: colony.tick(),
            scenario_name: "nursery",
        };
        PopulationSystem::new()
            .run(&ctx, colony, &mut manager.stream("population"))
            .unwrap();
    }

    #[test]
    fn job_completes_into_a_worker_then_expires() {
        let yaml = r#"
name: nursery
seed: 1
config:
  lifetimes: { worker: 2, claimer: 1 }
zones:
  - name: home
    hub: { x: 10, y: 10 }
    facility: { energy: 0 }
"#;
        let mut colony = Scenario::from_yaml(yaml).unwrap().build_colony().unwrap();
        let zone_id = colony.zone_ids()[0];
        let worker_id = colony.ids_mut().worker();
        colony.zone_mut(zone_id).unwrap().facility.as_mut().unwrap().job = Some(SpawnJob {
            worker: worker_id,
            role: Role::Gatherer,
            body: BodySpec::new(vec![BodyPart::Work, BodyPart::Carry, BodyPart::Move]),
            remaining: 2,
        });

        run(&mut colony);
        assert!(colony.worker(worker_id).is_none());
        run(&mut colony);
        let worker = colony.worker(worker_id).unwrap();
        assert_eq!(worker.lifetime, 2);
        assert_eq!(worker.position.x, 10);
        assert!(colony.zone(zone_id).unwrap().facility.as_ref().unwrap().job.is_none());

        run(&mut colony);
        run(&mut colony);
        assert!(colony.worker(worker_id).is_none());
        assert_eq!(colony.ledger().expired, 1);
    }
}
