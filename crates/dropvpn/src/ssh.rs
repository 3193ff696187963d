use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::remote::RemoteHost;

/// Per-command timeout for remote shell commands.
const EXEC_TIMEOUT: Duration = Duration::from_secs(120);

/// Transfer timeout for scp downloads.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Droplets boot with the key installed for root.
const SSH_USER: &str = "root";

/// Remote session over the system ssh/scp binaries with key-based auth.
///
/// Every operation is its own subprocess; nothing has to stay alive
/// across the multi-minute artifact wait.
pub struct SshSession {
    host: String,
    key_path: PathBuf,
    passphrase: Option<String>,
}

impl SshSession {
    pub fn new(host: impl Into<String>, config: &Config) -> Self {
        Self {
            host: host.into(),
            key_path: config.private_key.clone(),
            passphrase: config.passphrase.clone(),
        }
    }

    /// Base command for `ssh` or `scp`, feeding the key passphrase
    /// through sshpass when one is configured. The droplet was created
    /// moments ago, so there is no host key to check against.
    fn command(&self, program: &str) -> Command {
        let mut cmd = match &self.passphrase {
            Some(passphrase) => {
                let mut c = Command::new("sshpass");
                c.env("SSHPASS", passphrase);
                c.args(["-e", "-P", "passphrase", program]);
                c
            }
            None => Command::new(program),
        };

        cmd.args([
            "-o", "StrictHostKeyChecking=no",
            "-o", "UserKnownHostsFile=/dev/null",
            "-o", "LogLevel=ERROR",
            "-o", "ConnectTimeout=30",
        ]);
        cmd.arg("-i").arg(&self.key_path);
        cmd.stdin(Stdio::null());
        cmd
    }

    async fn exec(&self, remote_cmd: &str) -> Result<String> {
        let mut cmd = self.command("ssh");
        cmd.arg(format!("{SSH_USER}@{}", self.host)).arg(remote_cmd);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = tokio::time::timeout(EXEC_TIMEOUT, cmd.output())
            .await
            .map_err(|_| self.failure("ssh command timed out"))?
            .map_err(|e| self.failure(&format!("could not run ssh: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn failure(&self, reason: &str) -> Error {
        Error::Connection {
            host: self.host.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl RemoteHost for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn connect(&self) -> Result<()> {
        let output = self.exec("echo ok").await?;
        if output.trim() != "ok" {
            return Err(self.failure(&format!("unexpected response: {output}")));
        }
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let output = self.exec(&format!("ls -1a {path}")).await?;
        Ok(output.lines().map(str::to_string).collect())
    }

    async fn download(&self, remote_path: &str, local: &Path) -> Result<()> {
        let mut cmd = self.command("scp");
        cmd.arg(format!("{SSH_USER}@{}:{remote_path}", self.host))
            .arg(local);
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        let output = tokio::time::timeout(TRANSFER_TIMEOUT, cmd.output())
            .await
            .map_err(|_| self.failure("scp transfer timed out"))?
            .map_err(|e| self.failure(&format!("could not run scp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(&format!("scp failed: {}", stderr.trim())));
        }

        Ok(())
    }
}
