use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use colonist::{
    engine::{EngineBuilder, EngineSettings},
    logging,
    scenario::ScenarioLoader,
    systems::register_default_systems,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Zone logistics controller runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/frontier_outpost.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override snapshot interval in ticks (0 disables snapshots)
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); defaults to the scenario's
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    logging::init(
        cli.log_level
            .as_deref()
            .unwrap_or(&scenario.config.logging.level),
    )?;

    let mut colony = scenario.build_colony()?;
    let ticks = scenario.ticks(cli.ticks);
    let snapshot_interval = cli
        .snapshot_interval
        .unwrap_or(scenario.snapshot_interval_ticks);
    let snapshot_dir = cli
        .snapshot_dir
        .unwrap_or_else(|| PathBuf::from("snapshots"));

    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: snapshot_interval,
        snapshot_dir,
    };
    let mut engine = register_default_systems(EngineBuilder::new(settings)).build();
    engine.run(&mut colony, ticks)?;

    let ledger = colony.ledger();
    println!(
        "Scenario '{}' completed for {} ticks. Workers alive: {}, produced: {}, expired: {}, relay transfers: {}",
        scenario.name,
        ticks,
        colony.total_workers(),
        ledger.produced,
        ledger.expired,
        ledger.relay_transfers
    );
    for zone in colony.snapshot(&scenario.name).zones {
        println!(
            "  {}: {} (level {}, table {}, energy {}/{})",
            zone.name,
            zone.state,
            zone.level,
            zone.role_table_id,
            zone.energy_stored,
            zone.energy_capacity
        );
    }
    Ok(())
}
