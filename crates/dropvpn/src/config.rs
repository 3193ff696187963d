use std::env;
use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};

/// Command-line surface. Every setting can also come from the
/// environment (a `.env` file is honored), with flags taking precedence.
#[derive(Debug, Parser)]
#[command(
    name = "dropvpn",
    about = "Spin up a throwaway DigitalOcean VPN droplet and tear it down when done"
)]
pub struct Cli {
    /// DigitalOcean API token [env: DIGITALOCEAN_TOKEN]
    #[arg(short = 't', long)]
    pub token: Option<String>,

    /// Fingerprint of an SSH key registered with DigitalOcean [env: SSH_FINGERPRINT]
    #[arg(short = 'f', long)]
    pub fingerprint: Option<String>,

    /// Private key matching the registered fingerprint [env: SSH_PRIVATE_KEY]
    #[arg(short = 'k', long)]
    pub private_key: Option<PathBuf>,

    /// Passphrase for the private key, if it has one [env: SSH_PASSPHRASE]
    #[arg(short = 'p', long)]
    pub passphrase: Option<String>,

    /// Where to store the downloaded client profile [env: CLIENT_FILE]
    #[arg(short = 'c', long)]
    pub client_file: Option<PathBuf>,

    /// Path to the local openvpn binary [env: OPENVPN_PATH]
    #[arg(short = 'o', long)]
    pub openvpn: Option<PathBuf>,
}

/// Operator-supplied parameters, frozen for the duration of a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub fingerprint: String,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
    pub client_file: PathBuf,
    pub openvpn: PathBuf,
}

fn default_client_file() -> PathBuf {
    PathBuf::from("client.ovpn")
}

fn default_openvpn() -> PathBuf {
    PathBuf::from("/usr/sbin/openvpn")
}

impl Config {
    /// Merge flags over environment fallbacks. Required values with no
    /// flag, no env var, and no default fail here, before any resource
    /// is allocated.
    pub fn load(cli: Cli) -> Result<Self> {
        Ok(Self {
            token: require(cli.token, "DIGITALOCEAN_TOKEN", "--token")?,
            fingerprint: require(cli.fingerprint, "SSH_FINGERPRINT", "--fingerprint")?,
            private_key: require_path(cli.private_key, "SSH_PRIVATE_KEY", "--private-key")?,
            passphrase: cli.passphrase.or_else(|| env::var("SSH_PASSPHRASE").ok()),
            client_file: cli
                .client_file
                .or_else(|| env::var("CLIENT_FILE").ok().map(PathBuf::from))
                .unwrap_or_else(default_client_file),
            openvpn: cli
                .openvpn
                .or_else(|| env::var("OPENVPN_PATH").ok().map(PathBuf::from))
                .unwrap_or_else(default_openvpn),
        })
    }
}

fn require(flag: Option<String>, var: &str, flag_name: &str) -> Result<String> {
    flag.or_else(|| env::var(var).ok())
        .ok_or_else(|| Error::Config(format!("{var} is not set (or pass {flag_name})")))
}

fn require_path(flag: Option<PathBuf>, var: &str, flag_name: &str) -> Result<PathBuf> {
    flag.or_else(|| env::var(var).ok().map(PathBuf::from))
        .ok_or_else(|| Error::Config(format!("{var} is not set (or pass {flag_name})")))
}
