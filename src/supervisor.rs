use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::{StudiodConfig, SupervisorConfig};
use crate::health::HealthMonitor;
use crate::killswitch::{self, WatchOutcome};
use crate::lock::{self, InstanceLock};
use crate::ports::{self, PortProbe};
use crate::registry::ProcessRegistry;
use crate::service::{self, ReadyWait, ServiceHandle, ServiceSpec, ServiceState};
use crate::summary;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("port {port} required by '{service}' is still occupied after reclaim")]
    PortConflict { service: String, port: u16 },
    #[error(transparent)]
    Spawn(#[from] service::SpawnError),
    #[error("service '{service}' did not become ready within {timeout:?}")]
    ReadinessTimeout { service: String, timeout: Duration },
    #[error("service '{service}' exited during startup ({status})")]
    ExitedDuringStartup { service: String, status: ExitStatus },
    #[error("kill sentinel appeared during startup")]
    KillRequested,
}

/// One supervised service: its immutable spec plus the runtime handle slot.
/// The slot is `None` until a successful spawn and after the handle is
/// discarded following a confirmed startup death.
pub struct Managed {
    pub spec: ServiceSpec,
    pub handle: Mutex<Option<ServiceHandle>>,
    // State reported when no handle exists, so an optional service skipped
    // at startup still shows up as degraded rather than never-started.
    idle_state: std::sync::Mutex<ServiceState>,
}

impl Managed {
    pub fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            handle: Mutex::new(None),
            idle_state: std::sync::Mutex::new(ServiceState::NotStarted),
        }
    }

    pub async fn state(&self) -> ServiceState {
        match self.handle.lock().await.as_ref() {
            Some(handle) => handle.state,
            None => *self.idle_state.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    fn mark_degraded(&self) {
        *self.idle_state.lock().unwrap_or_else(|e| e.into_inner()) = ServiceState::Degraded;
    }
}

/// State shared between the main control task and the two background
/// watchers. Teardown is guarded by a one-shot flag so a concurrent
/// kill-sentinel trigger and a user interrupt cannot both run it.
pub struct Shared {
    pub services: Vec<Arc<Managed>>,
    pub registry: Arc<dyn ProcessRegistry>,
    pub probe: PortProbe,
    pub lock_file: PathBuf,
    pub kill_file: PathBuf,
    pub grace: Duration,
    shutdown: AtomicBool,
}

impl Shared {
    /// Returns true exactly once; later callers observe the flag set.
    fn begin_shutdown(&self) -> bool {
        !self.shutdown.swap(true, Ordering::SeqCst)
    }

    /// Cooperative teardown: stop handles with grace (reverse start order),
    /// then reclaim any configured port that is still occupied as a
    /// fallback net. The lock is released by the owner afterwards.
    pub async fn graceful_shutdown(&self) {
        if !self.begin_shutdown() {
            debug!("shutdown already ran, ignoring trigger");
            return;
        }
        info!("shutting down services");
        for managed in self.services.iter().rev() {
            let mut slot = managed.handle.lock().await;
            if let Some(handle) = slot.as_mut() {
                handle.stop(self.grace).await;
            }
        }
        for port in self.configured_ports() {
            if ports::is_occupied(port) {
                info!(port, "port still occupied after stop, reclaiming");
                self.probe.reclaim(port).await;
            }
        }
        info!("shutdown complete");
    }

    /// Emergency teardown for the kill-sentinel path: no grace waits, every
    /// known handle and every process still bound to a configured port is
    /// killed outright, and the sentinel and lock files are removed.
    pub async fn force_shutdown(&self) {
        let first = self.begin_shutdown();
        // The sentinel is consumed even when a graceful teardown already ran.
        let _ = std::fs::remove_file(&self.kill_file);
        if !first {
            return;
        }
        warn!("force shutdown initiated");
        for managed in &self.services {
            let mut slot = managed.handle.lock().await;
            if let Some(handle) = slot.as_mut() {
                warn!(service = %handle.name, pid = handle.pid, "force killing");
                handle.force_kill().await;
            }
        }
        for port in self.configured_ports() {
            for pid in self.registry.pids_listening_on(port) {
                warn!(port, pid, "force killing port owner");
                self.registry.force_kill(pid);
            }
        }
        lock::force_remove(&self.lock_file);
        warn!("force shutdown complete");
    }

    fn configured_ports(&self) -> Vec<u16> {
        self.services.iter().filter_map(|m| m.spec.port).collect()
    }
}

/// Composes the lock, port arbitration, service lifecycles, and the two
/// background watchers into the startup / monitor / shutdown sequence.
pub struct Supervisor {
    settings: SupervisorConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Supervisor {
    pub fn new(
        config: &StudiodConfig,
        base_dir: &Path,
        registry: Arc<dyn ProcessRegistry>,
    ) -> Self {
        let services = config
            .services
            .iter()
            .map(|cfg| Arc::new(Managed::new(ServiceSpec::from_config(cfg, base_dir))))
            .collect();
        let shared = Arc::new(Shared {
            services,
            registry: registry.clone(),
            probe: PortProbe::new(registry),
            lock_file: base_dir.join(&config.supervisor.lock_file),
            kill_file: base_dir.join(&config.supervisor.kill_file),
            grace: Duration::from_secs(config.supervisor.grace_secs),
            shutdown: AtomicBool::new(false),
        });
        Self {
            settings: config.supervisor.clone(),
            shared,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn shared(&self) -> Arc<Shared> {
        self.shared.clone()
    }

    /// Run the supervisor to completion: returns Ok on a normal or expected
    /// shutdown, Err on startup failure. The kill-sentinel path exits the
    /// process directly and never returns here.
    pub async fn run(&self) -> Result<()> {
        let lock = InstanceLock::acquire(
            &self.shared.lock_file,
            &*self.shared.registry,
            Duration::from_secs(self.settings.lock_stale_secs),
        )?;

        // A sentinel left over from a crashed run must not kill us at boot.
        if self.shared.kill_file.exists() {
            warn!("removing leftover kill sentinel from a previous run");
            let _ = std::fs::remove_file(&self.shared.kill_file);
        }

        if let Err(e) = self.start_services().await {
            error!("startup failed: {e}");
            self.shared.graceful_shutdown().await;
            let _ = std::fs::remove_file(&self.shared.kill_file);
            lock.release();
            return Err(e).context("startup failed");
        }

        self.print_summary().await;
        info!("startup complete, entering monitoring loop");

        let fatal = CancellationToken::new();

        {
            let shared = self.shared.clone();
            let cancel = self.cancel.clone();
            self.tracker.spawn(async move {
                match killswitch::watch(&shared.kill_file, &cancel).await {
                    WatchOutcome::KillRequested => {
                        shared.force_shutdown().await;
                        std::process::exit(1);
                    }
                    WatchOutcome::Cancelled => {}
                }
            });
        }

        {
            let monitor = HealthMonitor::new(
                self.shared.services.clone(),
                self.cancel.clone(),
                fatal.clone(),
            )
            .with_interval(Duration::from_secs(self.settings.health_interval_secs));
            self.tracker.spawn(monitor.run());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
            }
            _ = fatal.cancelled() => {
                error!("mandatory service died, shutting down");
            }
        }

        self.cancel.cancel();
        self.shared.graceful_shutdown().await;
        self.tracker.close();
        if tokio::time::timeout(Duration::from_secs(10), self.tracker.wait())
            .await
            .is_err()
        {
            warn!("background watchers did not stop within 10s");
        }
        lock.release();
        Ok(())
    }

    /// Start every service in declaration order: arbitrate its port, spawn,
    /// and wait for readiness. Mandatory failures abort the whole startup;
    /// optional failures degrade and continue.
    async fn start_services(&self) -> Result<()> {
        for managed in &self.shared.services {
            let spec = &managed.spec;

            if let Some(port) = spec.port {
                if ports::is_occupied(port) {
                    warn!(service = %spec.name, port, "port occupied, attempting reclaim");
                    self.shared.probe.reclaim(port).await;
                    if ports::is_occupied(port) {
                        if spec.optional {
                            warn!(
                                service = %spec.name,
                                port,
                                "port still occupied, continuing without optional service"
                            );
                            managed.mark_degraded();
                            continue;
                        }
                        return Err(StartupError::PortConflict {
                            service: spec.name.clone(),
                            port,
                        }
                        .into());
                    }
                }
            }

            let mut handle = match service::spawn(spec) {
                Ok(handle) => handle,
                Err(e) => {
                    if spec.optional {
                        warn!(service = %spec.name, "spawn failed, continuing without optional service: {e}");
                        managed.mark_degraded();
                        continue;
                    }
                    return Err(StartupError::Spawn(e).into());
                }
            };

            match handle.wait_ready(spec, &self.shared.kill_file).await {
                ReadyWait::Ready => {
                    *managed.handle.lock().await = Some(handle);
                }
                ReadyWait::TimedOut => {
                    if spec.optional {
                        // The process is kept; it may still come up later.
                        warn!(service = %spec.name, "readiness timeout, continuing in degraded mode");
                        handle.state = ServiceState::Degraded;
                        *managed.handle.lock().await = Some(handle);
                    } else {
                        *managed.handle.lock().await = Some(handle);
                        return Err(StartupError::ReadinessTimeout {
                            service: spec.name.clone(),
                            timeout: spec.startup_timeout,
                        }
                        .into());
                    }
                }
                ReadyWait::Exited(status) => {
                    if spec.optional {
                        warn!(service = %spec.name, %status, "exited during startup, continuing without it");
                        managed.mark_degraded();
                        continue;
                    }
                    return Err(StartupError::ExitedDuringStartup {
                        service: spec.name.clone(),
                        status,
                    }
                    .into());
                }
                ReadyWait::KillRequested => {
                    *managed.handle.lock().await = Some(handle);
                    return Err(StartupError::KillRequested.into());
                }
            }
        }
        Ok(())
    }

    async fn print_summary(&self) {
        let mut entries = Vec::new();
        for managed in &self.shared.services {
            entries.push(summary::ServiceSummary {
                name: managed.spec.name.clone(),
                port: managed.spec.port,
                state: managed.state().await,
            });
        }
        summary::print_startup_summary(&entries, &self.shared.kill_file);
    }
}
