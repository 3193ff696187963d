use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Directory and filename the boot script leaves the client profile at.
pub const ARTIFACT_DIR: &str = "/root";
pub const ARTIFACT_NAME: &str = "client.ovpn";

/// A remote host we can probe and pull files from.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Host name or address, for error reporting.
    fn host(&self) -> &str;

    /// One authenticated round-trip to prove the session is usable.
    async fn connect(&self) -> Result<()>;

    /// Names of the entries directly under `path`.
    async fn list_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Stream a remote file to `local`, replacing its content.
    async fn download(&self, remote_path: &str, local: &Path) -> Result<()>;
}

/// Retry budgets for the two independent failure modes of a freshly
/// booted droplet: sshd not accepting connections yet (short waits, few
/// attempts) and the OpenVPN install still running (long waits, many
/// attempts, about twenty minutes in total).
#[derive(Debug, Clone)]
pub struct RetryBudget {
    pub connect_wait: Duration,
    pub connect_attempts: u32,
    pub artifact_wait: Duration,
    pub artifact_attempts: u32,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            connect_wait: Duration::from_secs(10),
            connect_attempts: 5,
            artifact_wait: Duration::from_secs(60),
            artifact_attempts: 20,
        }
    }
}

/// Wait out the droplet's boot and OpenVPN install, then pull the
/// client profile down to `dest`.
pub async fn fetch_artifact(
    remote: &dyn RemoteHost,
    dest: &Path,
    budget: &RetryBudget,
) -> Result<()> {
    connect(remote, budget).await?;
    wait_for_artifact(remote, budget).await?;
    download(remote, dest).await
}

async fn connect(remote: &dyn RemoteHost, budget: &RetryBudget) -> Result<()> {
    info!(host = remote.host(), "connecting to droplet");

    for attempt in 1..=budget.connect_attempts {
        sleep(budget.connect_wait).await;
        info!(attempt, "ssh connection attempt");

        match remote.connect().await {
            Ok(()) => {
                info!(host = remote.host(), "connected");
                return Ok(());
            }
            Err(e) => debug!(attempt, error = %e, "connection attempt failed"),
        }
    }

    Err(Error::Connection {
        host: remote.host().to_string(),
        reason: format!("no response after {} attempts", budget.connect_attempts),
    })
}

async fn wait_for_artifact(remote: &dyn RemoteHost, budget: &RetryBudget) -> Result<()> {
    info!("waiting for {ARTIFACT_NAME} (the OpenVPN install can take several minutes)");

    for attempt in 1..=budget.artifact_attempts {
        info!(attempt, "checking for the client profile");

        let names = remote.list_dir(ARTIFACT_DIR).await?;
        if names.iter().any(|name| name == ARTIFACT_NAME) {
            info!("client profile is ready");
            return Ok(());
        }

        info!("not there yet, waiting");
        sleep(budget.artifact_wait).await;
    }

    Err(Error::ArtifactNotFound {
        path: format!("{ARTIFACT_DIR}/{ARTIFACT_NAME}"),
        attempts: budget.artifact_attempts,
    })
}

async fn download(remote: &dyn RemoteHost, dest: &Path) -> Result<()> {
    info!(dest = %dest.display(), "downloading the client profile");

    // Replace any stale profile from an earlier run.
    if dest.exists() {
        tokio::fs::remove_file(dest).await.map_err(|e| Error::Connection {
            host: remote.host().to_string(),
            reason: format!("could not remove stale {}: {e}", dest.display()),
        })?;
    }

    remote
        .download(&format!("{ARTIFACT_DIR}/{ARTIFACT_NAME}"), dest)
        .await?;

    info!(dest = %dest.display(), "client profile downloaded");
    Ok(())
}
