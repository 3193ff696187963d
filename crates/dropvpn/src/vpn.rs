use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Control over the local VPN client process.
#[async_trait]
pub trait VpnLauncher: Send {
    /// Start the client against a downloaded profile. Returns as soon
    /// as the process is spawned; the operator confirms readiness from
    /// the client's own output.
    fn launch(&mut self, profile: &Path) -> Result<()>;

    /// Stop the client if it is running. Safe to call when it was never
    /// launched or has already exited.
    async fn stop(&mut self);
}

/// Runs the system openvpn binary, elevating through sudo when the
/// orchestrator itself is not root.
pub struct OpenVpn {
    binary: PathBuf,
    child: Option<Child>,
}

impl OpenVpn {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            child: None,
        }
    }

    fn command(&self, profile: &Path) -> Command {
        let mut cmd = if is_root() {
            Command::new(&self.binary)
        } else {
            let mut c = Command::new("sudo");
            c.arg(&self.binary);
            c
        };
        cmd.arg("--config").arg(profile);

        // The session controller owns the terminal's stdin; the client
        // keeps stdout/stderr so the operator can watch its log.
        cmd.stdin(Stdio::null());
        cmd
    }
}

fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[async_trait]
impl VpnLauncher for OpenVpn {
    fn launch(&mut self, profile: &Path) -> Result<()> {
        info!(
            binary = %self.binary.display(),
            profile = %profile.display(),
            "starting the OpenVPN client"
        );

        let child = self
            .command(profile)
            .spawn()
            .map_err(|e| Error::ProcessLaunch(format!("{}: {e}", self.binary.display())))?;

        info!(
            pid = child.id(),
            "client started; wait for 'Initialization Sequence Completed' before using the tunnel"
        );
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        info!("stopping the OpenVPN client");
        if let Err(e) = child.kill().await {
            // Already exited on its own.
            debug!(error = %e, "client was not running");
        }
    }
}
