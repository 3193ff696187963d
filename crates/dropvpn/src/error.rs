#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provisioning error: {0}")]
    Provisioning(String),

    #[error("ssh connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    #[error("{path} never appeared on the droplet after {attempts} checks")]
    ArtifactNotFound { path: String, attempts: u32 },

    #[error("failed to launch the VPN client: {0}")]
    ProcessLaunch(String),

    #[error("failed to destroy droplet {droplet_id}: {reason} (destroy it manually to avoid further billing)")]
    Teardown { droplet_id: u64, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
