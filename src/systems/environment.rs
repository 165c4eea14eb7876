use anyhow::Result;
use tracing::{debug, info};
use rand::Rng;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{Colony, Hostile},
};

/// Node regeneration, relay cooldowns and hostile incursions.
pub struct EnvironmentSystem;

impl EnvironmentSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvironmentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EnvironmentSystem {
    fn name(&self) -> &str {
        "environment"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        colony: &mut Colony,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        for id in colony.zone_ids() {
            let Some(zone) = colony.zones.get_mut(&id) else {
                continue;
            };

            for node in &mut zone.nodes {
                if node.regen_interval > 0 && ctx.tick % node.regen_interval == 0 {
                    node.amount = node.amount.saturating_add(node.regen_amount).min(node.capacity);
                }
            }
            for relay in &mut zone.relays {
                relay.cooldown = relay.cooldown.saturating_sub(1);
            }

            // Active hostiles strike the weakest operational defense, or the
            // facility pool when nothing defends the zone.
            for hostile in &mut zone.hostiles {
                let target = zone
                    .defenses
                    .iter_mut()
                    .filter(|defense| defense.is_operational())
                    .min_by_key(|defense| defense.hits);
                match target {
                    Some(defense) => defense.hits = defense.hits.saturating_sub(hostile.power),
                    None => {
                        if let Some(facility) = zone.facility.as_mut() {
                            facility.energy = facility.energy.saturating_sub(hostile.power);
                        }
                    }
                }
                hostile.remaining = hostile.remaining.saturating_sub(1);
            }
            let before = zone.hostiles.len();
            zone.hostiles.retain(|hostile| hostile.remaining > 0);
            if zone.hostiles.len() < before {
                info!("zone {}: hostiles withdrew", zone.name);
            }

            let chance = zone.threat.incursion_chance.clamp(0.0, 1.0);
            if zone.hostiles.is_empty() && chance > 0.0 && rng.gen_bool(chance) {
                let power = zone.threat.power.max(1);
                let duration = zone.threat.duration.max(1);
                info!(
                    "zone {}: hostile incursion (power {power}, {duration} steps)",
                    zone.name
                );
                zone.hostiles.push(Hostile {
                    power,
                    remaining: duration,
                });
            } else if !zone.hostiles.is_empty() {
                debug!("zone {}: {} hostiles present", zone.name, zone.hostiles.len());
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
        scenario::Scenario,
        world::{Defense, PointId},
    };

    fn colony() -> Colony {
        let yaml = r#"
name: weather
seed: 1
zones:
  - name: home
    hub: { x: 10, y: 10 }
    facility: { energy: 200 }
    nodes:
      - { position: { x: 12, y: 10 }, amount: 100, capacity: 105, regen_amount: 10 }
    relays:
      - { position: { x: 13, y: 10 } }
"#;
        Scenario::from_yaml(yaml).unwrap().build_colony().unwrap()
    }

    fn run(colony: &mut Colony, tick: u64) {
        let mut manager = RngManager::new(1);
        let ctx = SystemContext {
            tick,
            scenario_name: "weather",
        };
        EnvironmentSystem::new()
            .run(&ctx, colony, &mut manager.stream("environment"))
            .unwrap();
    }

    #[test]
    fn nodes_regenerate_up_to_capacity() {
        let mut colony = colony();
        let id = colony.zone_ids()[0];
        colony.zone_mut(id).unwrap().relays[0].cooldown = 2;
        run(&mut colony, 1);
        let zone = colony.zone(id).unwrap();
        assert_eq!(zone.nodes[0].amount, 105);
        assert_eq!(zone.relays[0].cooldown, 1);
    }

    #[test]
    fn hostiles_wear_down_the_weakest_defense_then_leave() {
        let mut colony = colony();
        let id = colony.zone_ids()[0];
        {
            let zone = colony.zone_mut(id).unwrap();
            for (raw, hits) in [(90, 400), (91, 300)] {
                zone.defenses.push(Defense {
                    id: PointId::new(raw),
                    position: Position::new(9, 9),
                    hits,
                    max_hits: 1_000,
                });
            }
            zone.hostiles.push(Hostile {
                power: 100,
                remaining: 2,
            });
        }
        run(&mut colony, 1);
        run(&mut colony, 2);
        let zone = colony.zone(id).unwrap();
        assert_eq!(zone.defenses[0].hits, 400);
        assert_eq!(zone.defenses[1].hits, 100);
        assert!(zone.hostiles.is_empty());
    }

    #[test]
    fn certain_incursion_spawns_one_hostile() {
        let mut colony = colony();
        let id = colony.zone_ids()[0];
        {
            let threat = &mut colony.zone_mut(id).unwrap().threat;
            threat.incursion_chance = 1.0;
            threat.power = 30;
            threat.duration = 5;
        }
        run(&mut colony, 1);
        run(&mut colony, 2);
        let zone = colony.zone(id).unwrap();
        assert_eq!(zone.hostiles.len(), 1);
        // Undefended: the first strike lands on the facility pool.
        assert_eq!(zone.facility.as_ref().unwrap().energy, 170);
        assert_eq!(zone.hostiles[0].remaining, 4);
    }
}
