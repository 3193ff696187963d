use serde::{Deserialize, Serialize};

// ── Droplet types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateDropletRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_keys: Vec<String>,
    pub backups: bool,
    pub ipv6: bool,
    pub user_data: String,
    pub private_networking: bool,
}

/// Envelope the API wraps single-droplet responses in.
#[derive(Debug, Clone, Deserialize)]
pub struct DropletEnvelope {
    pub droplet: Droplet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Droplet {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub networks: Networks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkAddress>,
    #[serde(default)]
    pub v6: Vec<NetworkAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkAddress {
    pub ip_address: String,
    /// `"public"` or `"private"`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Droplet {
    /// First public IPv4 assigned to the droplet, if any. Empty right
    /// after creation until the provider finishes networking setup.
    pub fn public_v4(&self) -> Option<&str> {
        self.networks
            .v4
            .iter()
            .find(|addr| addr.kind == "public")
            .map(|addr| addr.ip_address.as_str())
    }
}
