use std::path::Path;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// The sentinel file is polled, not watched: a plain poll survives editors,
/// network filesystems, and `touch` from any shell.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The sentinel file appeared; the caller must run the forced shutdown.
    KillRequested,
    /// Normal shutdown cancelled the watch first.
    Cancelled,
}

/// Poll for the kill sentinel until it appears or the token is cancelled.
pub async fn watch(kill_file: &Path, cancel: &CancellationToken) -> WatchOutcome {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return WatchOutcome::Cancelled,
            _ = ticker.tick() => {
                if kill_file.exists() {
                    warn!(file = %kill_file.display(), "kill sentinel detected");
                    return WatchOutcome::KillRequested;
                }
            }
        }
    }
}
