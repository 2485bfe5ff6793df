//! Simulation info command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use vvc_eval::Simulation;

pub fn run(config: PathBuf) -> Result<()> {
    let sim = Simulation::from_config_file(&config)
        .with_context(|| format!("Failed to load simulation from {}", config.display()))?;

    println!("{}", sim.info());
    Ok(())
}
