pub mod assignment;
pub mod behavior;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod engine;
pub mod geometry;
pub mod logging;
pub mod population;
pub mod relay;
pub mod rng;
pub mod roles;
pub mod scenario;
pub mod scheduler;
pub mod snapshot;
pub mod systems;
pub mod world;

pub use config::ColonyConfig;
pub use engine::{Engine, EngineBuilder, EngineSettings};
pub use scenario::{Scenario, ScenarioLoader};
pub use world::{Colony, ColonySnapshot};
