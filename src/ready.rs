use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Per-attempt ceiling for a single probe; the overall readiness wait is
/// bounded separately by the service's startup timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a service signals it is able to serve requests, distinct from merely
/// having been spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyCheck {
    /// A successful TCP connect to the service's port.
    Tcp { port: u16 },
    /// An HTTP GET returning a success status. The body is never inspected.
    Http { url: String },
}

impl ReadyCheck {
    pub async fn probe(&self) -> Result<()> {
        match self {
            ReadyCheck::Tcp { port } => {
                tokio::time::timeout(
                    PROBE_TIMEOUT,
                    tokio::net::TcpStream::connect(("127.0.0.1", *port)),
                )
                .await
                .context("TCP connect timed out")?
                .context("TCP connect failed")?;
                Ok(())
            }
            ReadyCheck::Http { url } => {
                let client = reqwest::Client::builder()
                    .timeout(PROBE_TIMEOUT)
                    .build()
                    .context("building HTTP client")?;
                let response = client.get(url).send().await.context("HTTP ready check")?;
                if !response.status().is_success() {
                    bail!("HTTP ready check returned status {}", response.status());
                }
                Ok(())
            }
        }
    }
}
