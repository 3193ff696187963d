use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::provision::{self, DropletApi, ReadyWait};
use crate::remote::{self, RemoteHost, RetryBudget};
use crate::vpn::VpnLauncher;

/// Keyword the operator types to end the session.
const DONE_KEYWORD: &str = "quit";

/// All poll intervals and retry budgets for one run. Tests zero the
/// waits; production uses the defaults.
#[derive(Debug, Clone, Default)]
pub struct Timing {
    pub ready: ReadyWait,
    pub transfer: RetryBudget,
}

/// One full session: create the droplet, bring the tunnel up, hold it
/// open until the operator is done, then tear everything down.
///
/// A create failure aborts with nothing to clean up. Once the droplet
/// exists, every path runs the teardown tail: failures in the middle
/// are reported and acknowledged, then cleanup proceeds anyway.
pub async fn run<R, F, I>(
    api: &dyn DropletApi,
    launcher: &mut dyn VpnLauncher,
    make_remote: F,
    input: &mut I,
    config: &Config,
    timing: &Timing,
) -> Result<()>
where
    R: RemoteHost,
    F: FnOnce(&str) -> R,
    I: AsyncBufRead + Unpin,
{
    info!("creating droplet");
    let created = api.create(&provision::droplet_request(config)).await?;
    info!(droplet_id = created.id, name = %created.name, "droplet created");

    let outcome = establish(api, launcher, make_remote, input, config, timing, created.id).await;

    if let Err(e) = &outcome {
        error!(error = %e, "session failed, proceeding to cleanup");
        acknowledge(input).await;
    }

    launcher.stop().await;

    info!(droplet_id = created.id, "destroying droplet");
    api.delete(created.id).await?;
    info!(droplet_id = created.id, "droplet destroyed");

    outcome
}

/// Steps between creation and teardown: wait for readiness, pull the
/// client profile, start the client, block until the operator is done.
async fn establish<R, F, I>(
    api: &dyn DropletApi,
    launcher: &mut dyn VpnLauncher,
    make_remote: F,
    input: &mut I,
    config: &Config,
    timing: &Timing,
    droplet_id: u64,
) -> Result<()>
where
    R: RemoteHost,
    F: FnOnce(&str) -> R,
    I: AsyncBufRead + Unpin,
{
    let droplet = provision::wait_for_ready(api, droplet_id, &timing.ready).await?;
    let address = droplet.public_v4().ok_or_else(|| {
        Error::Provisioning(format!(
            "droplet {droplet_id} is active but has no public IPv4 address"
        ))
    })?;

    let session = make_remote(address);
    remote::fetch_artifact(&session, &config.client_file, &timing.transfer).await?;

    launcher.launch(&config.client_file)?;

    wait_for_done(input).await;
    Ok(())
}

/// Block until the operator types the completion keyword. EOF also
/// releases the session so a closed stdin cannot strand the droplet.
async fn wait_for_done<I: AsyncBufRead + Unpin>(input: &mut I) {
    prompt(&format!(
        "Type '{DONE_KEYWORD}' and press Enter to disconnect and destroy the droplet: "
    ));

    let mut line = String::new();
    loop {
        line.clear();
        match input.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) if line.trim().eq_ignore_ascii_case(DONE_KEYWORD) => return,
            Ok(_) => prompt(&format!("Unrecognized input; type '{DONE_KEYWORD}' to finish: ")),
        }
    }
}

/// Setup failures pause for an acknowledgment so the error is seen
/// before cleanup output scrolls past it.
async fn acknowledge<I: AsyncBufRead + Unpin>(input: &mut I) {
    prompt("Press Enter to continue with cleanup: ");
    let mut line = String::new();
    let _ = input.read_line(&mut line).await;
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}
