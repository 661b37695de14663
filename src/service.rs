use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Child;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{ReadyCheckConfig, ServiceConfig};
use crate::platform;
use crate::ready::ReadyCheck;

/// Readiness is re-probed at this fixed interval.
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotStarted,
    Starting,
    Ready,
    Degraded,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::NotStarted => "not started",
            ServiceState::Starting => "starting",
            ServiceState::Ready => "ready",
            ServiceState::Degraded => "degraded",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Immutable descriptor for one supervised service, built once at
/// configuration time.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSpec {
    pub name: String,
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub ready: Option<ReadyCheck>,
    pub startup_timeout: Duration,
    pub optional: bool,
    pub env: BTreeMap<String, String>,
}

impl ServiceSpec {
    pub fn from_config(cfg: &ServiceConfig, base_dir: &Path) -> Self {
        // A port with no explicit check still gets a TCP probe; a spec with
        // neither is considered ready as soon as the child survives spawn.
        let ready = match &cfg.ready_check {
            Some(ReadyCheckConfig::Http { url }) => Some(ReadyCheck::Http { url: url.clone() }),
            Some(ReadyCheckConfig::Tcp) | None => cfg.port.map(|port| ReadyCheck::Tcp { port }),
        };
        Self {
            name: cfg.name.clone(),
            command: cfg.command.clone(),
            working_dir: cfg.path.as_ref().map(|p| base_dir.join(p)),
            port: cfg.port,
            ready,
            startup_timeout: Duration::from_secs(cfg.startup_timeout_secs),
            optional: cfg.optional,
            env: cfg.env.clone(),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to spawn service '{name}': {source}")]
pub struct SpawnError {
    pub name: String,
    #[source]
    pub source: std::io::Error,
}

/// Outcome of a readiness wait.
#[derive(Debug)]
pub enum ReadyWait {
    Ready,
    TimedOut,
    /// The child exited before becoming ready; short-circuits the wait.
    Exited(std::process::ExitStatus),
    /// The kill sentinel appeared during the wait.
    KillRequested,
}

/// Mutable runtime record for one spawned child. The pid is recorded at
/// spawn and never changes for the handle's lifetime.
pub struct ServiceHandle {
    pub name: String,
    pub pid: u32,
    pub state: ServiceState,
    pub started_at: Instant,
    pub last_alive: Instant,
    child: Child,
    group: Option<platform::ProcessGroupHandle>,
}

/// Launch the service's command in its own process group with stdio
/// detached from the controlling terminal.
pub fn spawn(spec: &ServiceSpec) -> Result<ServiceHandle, SpawnError> {
    let mut cmd = platform::shell_command(&spec.command);
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }
    cmd.envs(&spec.env);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);
    platform::configure_process_group(&mut cmd);

    let child = cmd.spawn().map_err(|source| SpawnError {
        name: spec.name.clone(),
        source,
    })?;
    let pid = child.id().unwrap_or(0);
    let group = platform::post_spawn_setup(child.id());
    let now = Instant::now();
    info!(service = %spec.name, pid, shell = %platform::shell_name(), "spawned");

    Ok(ServiceHandle {
        name: spec.name.clone(),
        pid,
        state: ServiceState::Starting,
        started_at: now,
        last_alive: now,
        child,
        group,
    })
}

impl ServiceHandle {
    /// Poll the spec's readiness check until success or the startup timeout.
    /// Unexpected child exit and kill-sentinel appearance both short-circuit
    /// the wait instead of running out the clock.
    pub async fn wait_ready(&mut self, spec: &ServiceSpec, kill_file: &Path) -> ReadyWait {
        let Some(check) = &spec.ready else {
            self.state = ServiceState::Ready;
            info!(service = %self.name, "ready (no readiness check configured)");
            return ReadyWait::Ready;
        };

        info!(
            service = %self.name,
            timeout_secs = spec.startup_timeout.as_secs(),
            "waiting for readiness"
        );
        let deadline = Instant::now() + spec.startup_timeout;
        let mut ticker = tokio::time::interval(READY_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if kill_file.exists() {
                warn!(service = %self.name, "kill sentinel detected during startup wait");
                return ReadyWait::KillRequested;
            }
            if let Ok(Some(status)) = self.child.try_wait() {
                self.state = ServiceState::Stopped;
                warn!(service = %self.name, %status, "exited before becoming ready");
                return ReadyWait::Exited(status);
            }
            match check.probe().await {
                Ok(()) => {
                    self.state = ServiceState::Ready;
                    self.last_alive = Instant::now();
                    info!(
                        service = %self.name,
                        elapsed_ms = self.started_at.elapsed().as_millis() as u64,
                        "ready"
                    );
                    return ReadyWait::Ready;
                }
                Err(e) => {
                    debug!(service = %self.name, "not ready yet: {e:#}");
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    service = %self.name,
                    "readiness timeout after {:?}",
                    spec.startup_timeout
                );
                return ReadyWait::TimedOut;
            }
            ticker.tick().await;
        }
    }

    /// Graceful terminate with a bounded wait, escalating to a force kill.
    /// A process that is already gone counts as success; stop never fails
    /// and is idempotent.
    pub async fn stop(&mut self, grace: Duration) {
        if self.state == ServiceState::Stopped {
            return;
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(service = %self.name, %status, "already exited");
            self.state = ServiceState::Stopped;
            return;
        }
        info!(service = %self.name, pid = self.pid, "stopping");
        let child_pid = self.child.id();
        platform::terminate_child(&mut self.child, child_pid, grace, self.group.as_ref()).await;
        self.state = ServiceState::Stopped;
        info!(service = %self.name, "stopped");
    }

    /// Immediate kill of the whole process group, no grace. Used only by
    /// the forced-shutdown path.
    pub async fn force_kill(&mut self) {
        let child_pid = self.child.id();
        platform::force_kill_child(&mut self.child, child_pid, self.group.as_ref()).await;
        self.state = ServiceState::Stopped;
    }

    /// Non-blocking exit check.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => {
                self.last_alive = Instant::now();
                true
            }
            Ok(Some(_)) | Err(_) => false,
        }
    }
}
