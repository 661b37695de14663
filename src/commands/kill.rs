use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{resolve_config, StudiodConfig};

/// Create the kill sentinel next to the config file. The running supervisor
/// notices it within a second and force-stops everything.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config_path = resolve_config(config_path)?;
    let config = StudiodConfig::load(&config_path)?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));

    let lock_file = base_dir.join(&config.supervisor.lock_file);
    if !lock_file.exists() {
        println!("studiod does not appear to be running (no lock file).");
        return Ok(());
    }

    let kill_file = base_dir.join(&config.supervisor.kill_file);
    std::fs::write(&kill_file, b"")
        .with_context(|| format!("creating kill sentinel {}", kill_file.display()))?;
    println!("Kill requested via '{}'.", kill_file.display());
    println!("The supervisor will force-stop all services within a few seconds.");
    Ok(())
}
