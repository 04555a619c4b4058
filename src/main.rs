#![deny(clippy::expect_used, clippy::unwrap_used)]

use clap::Parser;
use std::process::ExitCode;
use tapbridge::{cli::Cli, device::TapDevice, logging, Tunnel};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().into_config();
    logging::init(&config.logging);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        interface = %config.interface.name,
        "tapbridge starting"
    );

    let tunnel = match Tunnel::<TapDevice>::start(config).await {
        Ok(tunnel) => tunnel,
        Err(e) if e.is_fatal() => {
            error!(error = %e, "can't start tunnel");
            eprintln!("tapbridge: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "invalid configuration");
            eprintln!("tapbridge: invalid configuration: {e}");
            return ExitCode::from(2);
        }
    };

    let e = tunnel.run().await;
    if e.is_fatal() {
        error!(error = %e, "tunnel stopped");
    } else {
        error!(error = %e, "relay stopped unexpectedly");
    }
    eprintln!("tapbridge: {e}");
    ExitCode::FAILURE
}
