mod bookkeeping;
mod controller;
mod environment;
mod population;
mod relay;
mod work;

pub use bookkeeping::BookkeepingSystem;
pub use controller::ControllerSystem;
pub use environment::EnvironmentSystem;
pub use population::PopulationSystem;
pub use relay::RelaySystem;
pub use work::WorkSystem;

use crate::engine::EngineBuilder;

/// Registers the standard step systems in their run order.
pub fn register_default_systems(builder: EngineBuilder) -> EngineBuilder {
    builder
        .with_system(EnvironmentSystem::new())
        .with_system(PopulationSystem::new())
        .with_system(ControllerSystem::new())
        .with_system(WorkSystem::new())
        .with_system(RelaySystem::new())
        .with_system(BookkeepingSystem::new())
}
