use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::registry::ProcessRegistry;

/// How long a terminated port owner gets to exit before being force-killed.
pub const KILL_WAIT: Duration = Duration::from_secs(3);

/// Socket release is not instantaneous after process death; callers re-probe
/// only after this settle delay.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Bind test against localhost: bind-success means free.
pub fn is_occupied(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_err()
}

/// Checks TCP port occupancy and reclaims ports by terminating the owning
/// process(es) through the [`ProcessRegistry`] capability.
pub struct PortProbe {
    registry: Arc<dyn ProcessRegistry>,
    kill_wait: Duration,
    settle: Duration,
}

impl PortProbe {
    pub fn new(registry: Arc<dyn ProcessRegistry>) -> Self {
        Self {
            registry,
            kill_wait: KILL_WAIT,
            settle: SETTLE_DELAY,
        }
    }

    pub fn with_delays(registry: Arc<dyn ProcessRegistry>, kill_wait: Duration, settle: Duration) -> Self {
        Self {
            registry,
            kill_wait,
            settle,
        }
    }

    pub fn is_occupied(&self, port: u16) -> bool {
        is_occupied(port)
    }

    /// Terminate every process listening on `port`, escalating to a force
    /// kill after [`KILL_WAIT`]. Returns whether any process was removed;
    /// when one was, the settle delay has already elapsed on return.
    pub async fn reclaim(&self, port: u16) -> bool {
        let mut removed = false;

        for pid in self.registry.pids_listening_on(port) {
            let label = self
                .registry
                .describe(pid)
                .unwrap_or_else(|| format!("PID {}", pid));
            if !self.registry.terminate(pid) {
                // Exited on its own between enumeration and the signal.
                debug!(port, pid, "port owner gone before terminate");
                continue;
            }
            info!(port, pid, process = %label, "terminating port owner");
            if !self.wait_exit(pid).await {
                warn!(port, pid, "port owner did not exit within {:?}, force killing", self.kill_wait);
                self.registry.force_kill(pid);
            }
            removed = true;
        }

        if removed {
            tokio::time::sleep(self.settle).await;
        }
        removed
    }

    async fn wait_exit(&self, pid: u32) -> bool {
        let deadline = Instant::now() + self.kill_wait;
        while self.registry.is_alive(pid) {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }
}
