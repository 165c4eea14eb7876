use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    world::{Colony, ColonySnapshot},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            settings: self.settings,
        }
    }
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn run(&mut self, colony: &mut Colony, ticks: u64) -> Result<()> {
        self.run_with_hook(colony, ticks, |_| {})
    }

    /// Runs `ticks` steps, handing the end-of-step snapshot to `hook`.
    pub fn run_with_hook(
        &mut self,
        colony: &mut Colony,
        ticks: u64,
        mut hook: impl FnMut(&ColonySnapshot),
    ) -> Result<()> {
        for _ in 0..ticks {
            self.step(colony)?;
            let snapshot = colony.snapshot(&self.settings.scenario_name);
            self.snapshot_writer.maybe_write(&snapshot)?;
            hook(&snapshot);
        }
        Ok(())
    }

    fn step(&mut self, colony: &mut Colony) -> Result<()> {
        let current_tick = colony.tick();
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            let ctx = SystemContext {
                tick: current_tick,
                scenario_name: &self.settings.scenario_name,
            };
            system
                .run(&ctx, colony, &mut rng_stream)
                .with_context(|| format!("system {} failed at tick {current_tick}", system.name()))?;
        }
        colony.advance_time();
        Ok(())
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|system| system.name()).collect()
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub scenario_name: &'a str,
}

pub trait System {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        colony: &mut Colony,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
