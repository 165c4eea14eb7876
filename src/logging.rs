use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level).map_err(|_| anyhow!("invalid log level `{level}`"))
}

/// `RUST_LOG` directives when set, otherwise everything at `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    let level = parse_level(level)?;
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy())
}

/// Installs the stderr subscriber. Only the first call in a process takes effect.
pub fn init(level: &str) -> Result<()> {
    let filter = env_filter(level)?;
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
    Ok(())
}
