use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::service::ServiceState;
use crate::supervisor::Managed;

pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Periodic liveness sweep over the running services. An optional service
/// that dies is logged and marked stopped; a mandatory one trips the fatal
/// token, which ends the whole supervisor.
pub struct HealthMonitor {
    services: Vec<Arc<Managed>>,
    cancel: CancellationToken,
    fatal: CancellationToken,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        services: Vec<Arc<Managed>>,
        cancel: CancellationToken,
        fatal: CancellationToken,
    ) -> Self {
        Self {
            services,
            cancel,
            fatal,
            interval: CHECK_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; services just passed their readiness
        // checks, so the first sweep waits a full period.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            for managed in &self.services {
                let mut slot = managed.handle.lock().await;
                let Some(handle) = slot.as_mut() else {
                    continue;
                };
                if !matches!(handle.state, ServiceState::Ready | ServiceState::Degraded) {
                    continue;
                }
                if handle.is_alive() {
                    debug!(service = %handle.name, "alive");
                    continue;
                }
                handle.state = ServiceState::Stopped;
                if managed.spec.optional {
                    warn!(
                        service = %handle.name,
                        "optional service died, continuing without it"
                    );
                } else {
                    error!(service = %handle.name, "mandatory service died");
                    self.fatal.cancel();
                    return;
                }
            }
        }
    }
}
