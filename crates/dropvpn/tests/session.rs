//! End-to-end session runs over scripted fakes of the provider, the
//! remote host, and the VPN launcher.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use do_api::{CreateDropletRequest, Droplet, NetworkAddress, Networks};
use dropvpn::config::Config;
use dropvpn::error::{Error, Result};
use dropvpn::provision::{DropletApi, ReadyWait};
use dropvpn::remote::{RemoteHost, RetryBudget};
use dropvpn::session::{self, Timing};
use dropvpn::vpn::VpnLauncher;
use uuid::Uuid;

const DROPLET_ID: u64 = 42;

fn droplet(status: &str, ip: Option<&str>) -> Droplet {
    let v4 = ip
        .map(|ip| {
            vec![NetworkAddress {
                ip_address: ip.into(),
                kind: "public".into(),
            }]
        })
        .unwrap_or_default();
    Droplet {
        id: DROPLET_ID,
        name: "dropvpn-test".into(),
        status: status.into(),
        networks: Networks { v4, v6: vec![] },
    }
}

// ── Fakes ────────────────────────────────────────────────────────────

struct FakeApi {
    gets: Mutex<VecDeque<Droplet>>,
    deleted: Mutex<Vec<u64>>,
    fail_create: bool,
    fail_delete: bool,
}

impl FakeApi {
    fn new(gets: Vec<Droplet>) -> Self {
        Self {
            gets: Mutex::new(gets.into()),
            deleted: Mutex::new(Vec::new()),
            fail_create: false,
            fail_delete: false,
        }
    }

    fn deleted(&self) -> Vec<u64> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DropletApi for FakeApi {
    async fn create(&self, req: &CreateDropletRequest) -> Result<Droplet> {
        assert!(req.name.starts_with("dropvpn-"));
        if self.fail_create {
            return Err(Error::Provisioning("create droplet: 401 unauthorized".into()));
        }
        Ok(droplet("new", None))
    }

    async fn get(&self, _droplet_id: u64) -> Result<Droplet> {
        self.gets
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Provisioning("unexpected get".into()))
    }

    async fn delete(&self, droplet_id: u64) -> Result<()> {
        self.deleted.lock().unwrap().push(droplet_id);
        if self.fail_delete {
            return Err(Error::Teardown {
                droplet_id,
                reason: "api returned 500".into(),
            });
        }
        Ok(())
    }
}

struct FakeRemote {
    connect_failures: Mutex<u32>,
    listings: Mutex<VecDeque<Vec<String>>>,
    content: &'static [u8],
}

impl FakeRemote {
    fn new(connect_failures: u32, misses: usize, content: &'static [u8]) -> Self {
        let mut listings: VecDeque<Vec<String>> = VecDeque::new();
        for _ in 0..misses {
            listings.push_back(vec!["snap".into(), ".ssh".into()]);
        }
        listings.push_back(vec!["snap".into(), "client.ovpn".into()]);
        Self {
            connect_failures: Mutex::new(connect_failures),
            listings: Mutex::new(listings),
            content,
        }
    }
}

#[async_trait]
impl RemoteHost for FakeRemote {
    fn host(&self) -> &str {
        "203.0.113.7"
    }

    async fn connect(&self) -> Result<()> {
        let mut left = self.connect_failures.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(Error::Connection {
                host: self.host().into(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn list_dir(&self, _path: &str) -> Result<Vec<String>> {
        Ok(self.listings.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn download(&self, _remote_path: &str, local: &Path) -> Result<()> {
        std::fs::write(local, self.content).unwrap();
        Ok(())
    }
}

#[derive(Default)]
struct FakeLauncher {
    launched: Vec<PathBuf>,
    stops: u32,
    fail_launch: bool,
}

#[async_trait]
impl VpnLauncher for FakeLauncher {
    fn launch(&mut self, profile: &Path) -> Result<()> {
        if self.fail_launch {
            return Err(Error::ProcessLaunch("sudo: command not found".into()));
        }
        self.launched.push(profile.to_path_buf());
        Ok(())
    }

    async fn stop(&mut self) {
        self.stops += 1;
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn test_config(client_file: PathBuf) -> Config {
    Config {
        token: "do-token".into(),
        fingerprint: "aa:bb:cc".into(),
        private_key: PathBuf::from("/home/op/.ssh/id_ed25519"),
        passphrase: None,
        client_file,
        openvpn: PathBuf::from("/usr/sbin/openvpn"),
    }
}

fn zero_timing(ready_attempts: u32) -> Timing {
    Timing {
        ready: ReadyWait {
            interval: Duration::ZERO,
            max_attempts: ready_attempts,
        },
        transfer: RetryBudget {
            connect_wait: Duration::ZERO,
            connect_attempts: 5,
            artifact_wait: Duration::ZERO,
            artifact_attempts: 20,
        },
    }
}

fn scratch_path() -> PathBuf {
    std::env::temp_dir().join(format!("dropvpn-session-test-{}", Uuid::new_v4()))
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn full_session_downloads_connects_and_tears_down() {
    // Active on the third poll, ssh up on the second try, profile there
    // on the fifth check, operator types quit.
    let api = FakeApi::new(vec![
        droplet("new", None),
        droplet("active", None),
        droplet("active", Some("203.0.113.7")),
    ]);
    let mut launcher = FakeLauncher::default();
    let dest = scratch_path();
    let config = test_config(dest.clone());
    let mut input = &b"quit\n"[..];

    let result = session::run(
        &api,
        &mut launcher,
        |_address| FakeRemote::new(1, 4, b"remote ovpn profile\n"),
        &mut input,
        &config,
        &zero_timing(5),
    )
    .await;

    assert!(result.is_ok(), "got {result:?}");
    assert_eq!(launcher.launched, vec![dest.clone()]);
    assert_eq!(launcher.stops, 1);
    assert_eq!(api.deleted(), vec![DROPLET_ID]);

    let local = std::fs::read(&dest).unwrap();
    assert_eq!(local, b"remote ovpn profile\n");
    std::fs::remove_file(&dest).unwrap();
}

#[tokio::test]
async fn droplet_that_never_readies_is_still_destroyed() {
    let api = FakeApi::new(vec![
        droplet("new", None),
        droplet("new", None),
        droplet("new", None),
    ]);
    let mut launcher = FakeLauncher::default();
    let dest = scratch_path();
    let config = test_config(dest.clone());
    // One line for the failure acknowledgment prompt.
    let mut input = &b"\n"[..];

    let result = session::run(
        &api,
        &mut launcher,
        |_address| FakeRemote::new(0, 0, b""),
        &mut input,
        &config,
        &zero_timing(3),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Provisioning(_)), "got {err:?}");
    assert!(launcher.launched.is_empty(), "client must not be launched");
    assert_eq!(launcher.stops, 1, "stop is still requested as a no-op");
    assert_eq!(api.deleted(), vec![DROPLET_ID]);
    assert!(!dest.exists());
}

#[tokio::test]
async fn launch_failure_still_tears_down() {
    let api = FakeApi::new(vec![droplet("active", Some("203.0.113.7"))]);
    let mut launcher = FakeLauncher {
        fail_launch: true,
        ..FakeLauncher::default()
    };
    let dest = scratch_path();
    let config = test_config(dest.clone());
    let mut input = &b"\n"[..];

    let result = session::run(
        &api,
        &mut launcher,
        |_address| FakeRemote::new(0, 0, b"remote ovpn profile\n"),
        &mut input,
        &config,
        &zero_timing(3),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::ProcessLaunch(_)), "got {err:?}");
    assert_eq!(api.deleted(), vec![DROPLET_ID]);

    std::fs::remove_file(&dest).unwrap();
}

#[tokio::test]
async fn failed_delete_surfaces_the_droplet_id() {
    let api = FakeApi {
        fail_delete: true,
        ..FakeApi::new(vec![droplet("active", Some("203.0.113.7"))])
    };
    let mut launcher = FakeLauncher::default();
    let dest = scratch_path();
    let config = test_config(dest.clone());
    let mut input = &b"quit\n"[..];

    let result = session::run(
        &api,
        &mut launcher,
        |_address| FakeRemote::new(0, 0, b"remote ovpn profile\n"),
        &mut input,
        &config,
        &zero_timing(3),
    )
    .await;

    match result.unwrap_err() {
        Error::Teardown { droplet_id, .. } => assert_eq!(droplet_id, DROPLET_ID),
        other => panic!("got {other:?}"),
    }
    assert_eq!(launcher.stops, 1);

    std::fs::remove_file(&dest).unwrap();
}

#[tokio::test]
async fn create_failure_owes_no_cleanup() {
    let api = FakeApi {
        fail_create: true,
        ..FakeApi::new(vec![])
    };
    let mut launcher = FakeLauncher::default();
    let dest = scratch_path();
    let config = test_config(dest.clone());
    let mut input = &b""[..];

    let result = session::run(
        &api,
        &mut launcher,
        |_address| FakeRemote::new(0, 0, b""),
        &mut input,
        &config,
        &zero_timing(3),
    )
    .await;

    assert!(matches!(result, Err(Error::Provisioning(_))));
    assert!(api.deleted().is_empty(), "nothing was created, nothing to delete");
    assert_eq!(launcher.stops, 0);
}

#[tokio::test]
async fn eof_on_stdin_still_tears_down() {
    let api = FakeApi::new(vec![droplet("active", Some("203.0.113.7"))]);
    let mut launcher = FakeLauncher::default();
    let dest = scratch_path();
    let config = test_config(dest.clone());
    let mut input = &b""[..];

    let result = session::run(
        &api,
        &mut launcher,
        |_address| FakeRemote::new(0, 0, b"remote ovpn profile\n"),
        &mut input,
        &config,
        &zero_timing(3),
    )
    .await;

    assert!(result.is_ok(), "got {result:?}");
    assert_eq!(api.deleted(), vec![DROPLET_ID]);

    std::fs::remove_file(&dest).unwrap();
}
