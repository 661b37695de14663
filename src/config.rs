use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "studiod.toml";

#[derive(Debug, Deserialize)]
pub struct StudiodConfig {
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceConfig>,
}

/// Supervisor-level knobs. File paths are relative to the config file's
/// directory. Defaults match the stock Studio deployment.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    pub lock_file: PathBuf,
    pub kill_file: PathBuf,
    pub log_file: PathBuf,
    pub lock_stale_secs: u64,
    pub grace_secs: u64,
    pub health_interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            lock_file: PathBuf::from("studiod.lock"),
            kill_file: PathBuf::from("studiod.kill"),
            log_file: PathBuf::from("studiod.log"),
            lock_stale_secs: 300,
            grace_secs: 5,
            health_interval_secs: 10,
        }
    }
}

fn default_startup_timeout_secs() -> u64 {
    60
}

/// One supervised service. Services start in declaration order, which is
/// also their dependency order.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Optional services degrade gracefully instead of failing startup.
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    #[serde(default)]
    pub ready_check: Option<ReadyCheckConfig>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReadyCheckConfig {
    Tcp,
    Http { url: String },
}

impl StudiodConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: StudiodConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            bail!("no [[service]] entries configured");
        }
        let mut seen = std::collections::BTreeSet::new();
        for svc in &self.services {
            if svc.name.trim().is_empty() {
                bail!("a [[service]] entry has an empty name");
            }
            if !seen.insert(svc.name.as_str()) {
                bail!("duplicate service name '{}'", svc.name);
            }
            if svc.command.trim().is_empty() {
                bail!("service '{}' has an empty command", svc.name);
            }
            if matches!(svc.ready_check, Some(ReadyCheckConfig::Tcp)) && svc.port.is_none() {
                bail!("service '{}' uses a tcp ready check but has no port", svc.name);
            }
        }
        Ok(())
    }
}

/// Resolve the config file: an explicit `-f` path, or studiod.toml in the
/// current directory.
pub fn resolve_config(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config file {} not found", path.display());
        }
        return Ok(path.to_path_buf());
    }
    let default = std::env::current_dir()?.join(DEFAULT_CONFIG_FILE);
    if !default.exists() {
        bail!(
            "no {} found in the current directory (run `studiod init` to create one)",
            DEFAULT_CONFIG_FILE
        );
    }
    Ok(default)
}
