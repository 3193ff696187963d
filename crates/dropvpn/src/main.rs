use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use dropvpn::config::{Cli, Config};
use dropvpn::session::{self, Timing};
use dropvpn::ssh::SshSession;
use dropvpn::vpn::OpenVpn;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = match Config::load(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let client = do_api::DoClient::new(config.token.clone());
    let mut launcher = OpenVpn::new(&config.openvpn);
    let mut input = BufReader::new(tokio::io::stdin());
    let timing = Timing::default();

    let result = session::run(
        &client,
        &mut launcher,
        |address| SshSession::new(address, &config),
        &mut input,
        &config,
        &timing,
    )
    .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "dropvpn session ended with an error");
        std::process::exit(1);
    }
}
