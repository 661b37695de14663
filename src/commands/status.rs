use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::config::{resolve_config, StudiodConfig};
use crate::ports;
use crate::registry::{ProcessRegistry, SystemRegistry};

/// Read-only view of a deployment from the outside: lock owner liveness plus
/// per-service port occupancy. No signals are sent.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config_path = resolve_config(config_path)?;
    let config = StudiodConfig::load(&config_path)?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let color = std::io::stdout().is_terminal();

    let lock_file = base_dir.join(&config.supervisor.lock_file);
    println!();
    match read_lock(&lock_file, &SystemRegistry) {
        LockStatus::Absent => {
            println!("  Supervisor: not running (no lock file)");
        }
        LockStatus::Live { pid, age } => {
            let label = format!("running (pid {}, locked {} ago)", pid, fmt_age(age));
            if color {
                println!("  Supervisor: {}", label.green());
            } else {
                println!("  Supervisor: {}", label);
            }
        }
        LockStatus::Dead { pid } => {
            let label = format!("stale lock (pid {} is gone)", pid);
            if color {
                println!("  Supervisor: {}", label.yellow());
            } else {
                println!("  Supervisor: {}", label);
            }
        }
        LockStatus::Corrupted => {
            println!("  Supervisor: lock file is unreadable");
        }
    }

    println!();
    println!("  {:<16} {:<8} {}", "SERVICE", "PORT", "PORT STATUS");
    println!("  {}", "-".repeat(44));
    for svc in &config.services {
        let (port, occupied) = match svc.port {
            Some(port) => (port.to_string(), Some(ports::is_occupied(port))),
            None => ("-".to_string(), None),
        };
        let status = match occupied {
            Some(true) => {
                if color {
                    "in use".green().to_string()
                } else {
                    "in use".to_string()
                }
            }
            Some(false) => "free".to_string(),
            None => "-".to_string(),
        };
        println!("  {:<16} {:<8} {}", svc.name, port, status);
    }
    println!();
    Ok(())
}

enum LockStatus {
    Absent,
    Live { pid: u32, age: Duration },
    Dead { pid: u32 },
    Corrupted,
}

fn read_lock(path: &Path, registry: &dyn ProcessRegistry) -> LockStatus {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return LockStatus::Absent,
    };
    let Ok(pid) = content.trim().parse::<u32>() else {
        return LockStatus::Corrupted;
    };
    if registry.is_alive(pid) {
        let age = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .unwrap_or(Duration::ZERO);
        LockStatus::Live { pid, age }
    } else {
        LockStatus::Dead { pid }
    }
}

fn fmt_age(age: Duration) -> String {
    // Whole seconds keep humantime's output short.
    humantime::format_duration(Duration::from_secs(age.as_secs())).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeRegistry;
    use tempfile::tempdir;

    #[test]
    fn absent_lock() {
        let dir = tempdir().unwrap();
        let registry = FakeRegistry::new();
        assert!(matches!(
            read_lock(&dir.path().join("studiod.lock"), &registry),
            LockStatus::Absent
        ));
    }

    #[test]
    fn live_and_dead_owners() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("studiod.lock");
        let registry = FakeRegistry::new();
        registry.add_process(4242);

        std::fs::write(&path, "4242").unwrap();
        assert!(matches!(
            read_lock(&path, &registry),
            LockStatus::Live { pid: 4242, .. }
        ));

        std::fs::write(&path, "7777").unwrap();
        assert!(matches!(
            read_lock(&path, &registry),
            LockStatus::Dead { pid: 7777 }
        ));
    }

    #[test]
    fn corrupted_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("studiod.lock");
        std::fs::write(&path, "garbage").unwrap();
        let registry = FakeRegistry::new();
        assert!(matches!(read_lock(&path, &registry), LockStatus::Corrupted));
    }

    #[test]
    fn fmt_age_truncates_subseconds() {
        assert_eq!(fmt_age(Duration::from_millis(61_250)), "1m 1s");
    }
}
