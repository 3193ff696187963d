//! Typed Rust client for the DigitalOcean Droplets API.
//!
//! Covers the subset needed for running throwaway VPN droplets:
//! droplets (create, get, delete).

mod types;

pub use types::*;

const BASE_URL: &str = "https://api.digitalocean.com/v2";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("digitalocean api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("digitalocean api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the DigitalOcean v2 REST API.
#[derive(Clone)]
pub struct DoClient {
    token: String,
    http: reqwest::Client,
}

impl DoClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{BASE_URL}{path}")
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn api_error(
        resp: reqwest::Response,
        endpoint: &'static str,
    ) -> Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Error::Api { endpoint, status, body }
    }

    // ── Droplets ─────────────────────────────────────────────────────

    /// Request a new droplet. The API acknowledges accepted creation
    /// requests with 202; anything else is a failure.
    pub async fn create_droplet(&self, req: &CreateDropletRequest) -> Result<Droplet> {
        let resp = self
            .http
            .post(self.url("/droplets"))
            .header("Authorization", self.auth())
            .json(req)
            .send()
            .await?;

        if resp.status() != reqwest::StatusCode::ACCEPTED {
            return Err(Self::api_error(resp, "create droplet").await);
        }

        let envelope: DropletEnvelope = resp.json().await?;
        Ok(envelope.droplet)
    }

    pub async fn get_droplet(&self, droplet_id: u64) -> Result<Droplet> {
        let resp = self
            .http
            .get(self.url(&format!("/droplets/{droplet_id}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp, "get droplet").await);
        }

        let envelope: DropletEnvelope = resp.json().await?;
        Ok(envelope.droplet)
    }

    /// Destroy a droplet. Success is the documented 204; a 404 means the
    /// droplet is already gone and is treated as success so teardown can
    /// be retried safely.
    pub async fn delete_droplet(&self, droplet_id: u64) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/droplets/{droplet_id}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::NO_CONTENT
            && status != reqwest::StatusCode::NOT_FOUND
        {
            return Err(Self::api_error(resp, "delete droplet").await);
        }

        Ok(())
    }
}
