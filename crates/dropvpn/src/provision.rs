use std::time::Duration;

use async_trait::async_trait;
use do_api::{CreateDropletRequest, DoClient, Droplet};
use tokio::time::sleep;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};

/// Fixed droplet selection. The smallest current slug is plenty for a
/// single OpenVPN endpoint.
const REGION: &str = "nyc3";
const SIZE: &str = "s-1vcpu-512mb-10gb";
const IMAGE: &str = "ubuntu-22-04-x64";

/// Unattended road-warrior OpenVPN install, run by cloud-init on first
/// boot. Leaves the client profile at /root/client.ovpn, which the
/// retriever polls for.
const BOOT_SCRIPT: &str = r#"#!/bin/bash
set -eu
export AUTO_INSTALL=y
export APPROVE_INSTALL=y
export APPROVE_IP=y
export CLIENT=client
curl -fsSL https://raw.githubusercontent.com/angristan/openvpn-install/master/openvpn-install.sh \
    -o /root/openvpn-install.sh
chmod +x /root/openvpn-install.sh
/root/openvpn-install.sh
"#;

/// Droplet operations the orchestrator needs from the provider.
#[async_trait]
pub trait DropletApi: Send + Sync {
    async fn create(&self, req: &CreateDropletRequest) -> Result<Droplet>;
    async fn get(&self, droplet_id: u64) -> Result<Droplet>;
    async fn delete(&self, droplet_id: u64) -> Result<()>;
}

#[async_trait]
impl DropletApi for DoClient {
    async fn create(&self, req: &CreateDropletRequest) -> Result<Droplet> {
        self.create_droplet(req)
            .await
            .map_err(|e| Error::Provisioning(format!("create droplet: {e}")))
    }

    async fn get(&self, droplet_id: u64) -> Result<Droplet> {
        self.get_droplet(droplet_id)
            .await
            .map_err(|e| Error::Provisioning(format!("get droplet: {e}")))
    }

    async fn delete(&self, droplet_id: u64) -> Result<()> {
        self.delete_droplet(droplet_id)
            .await
            .map_err(|e| Error::Teardown {
                droplet_id,
                reason: e.to_string(),
            })
    }
}

/// Creation request for one throwaway VPN droplet.
pub fn droplet_request(config: &Config) -> CreateDropletRequest {
    CreateDropletRequest {
        name: format!("dropvpn-{}", Uuid::new_v4()),
        region: REGION.into(),
        size: SIZE.into(),
        image: IMAGE.into(),
        ssh_keys: vec![config.fingerprint.clone()],
        backups: false,
        ipv6: true,
        user_data: BOOT_SCRIPT.into(),
        private_networking: false,
    }
}

/// How long to keep polling a new droplet for readiness.
///
/// The provider reports `active` well before the 40-attempt cap in
/// practice; the cap exists so a wedged droplet cannot block the run
/// forever.
#[derive(Debug, Clone)]
pub struct ReadyWait {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReadyWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12),
            max_attempts: 40,
        }
    }
}

/// Poll until the droplet reports `active` with a public IPv4 assigned.
///
/// The first sleep doubles as the settle wait after creation. A failed
/// `get` aborts immediately rather than retrying against a broken API.
pub async fn wait_for_ready(
    api: &dyn DropletApi,
    droplet_id: u64,
    wait: &ReadyWait,
) -> Result<Droplet> {
    for attempt in 1..=wait.max_attempts {
        sleep(wait.interval).await;
        info!(attempt, droplet_id, "checking droplet state");

        let droplet = api.get(droplet_id).await?;
        if droplet.status == "active" && droplet.public_v4().is_some() {
            info!(droplet_id, address = droplet.public_v4(), "droplet is ready");
            return Ok(droplet);
        }
    }

    Err(Error::Provisioning(format!(
        "could not obtain an IPv4 address for droplet {droplet_id}"
    )))
}
