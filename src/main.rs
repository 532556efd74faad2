// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present DND Contributors

use clap::Parser;
use dnd::config::{CliArgs, DndConfiguration};
use dnd::daemon;
use log::{error, info, warn};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// `-v` count to default log filter; RUST_LOG takes precedence
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let config = match DndConfiguration::from_cli(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::from(2);
    }

    info!("=== DTN Neighbor Discovery ===");
    config.log_summary();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                on_signal.cancel();
            }
            Err(e) => warn!("Can't listen for Ctrl-C: {}", e),
        }
    });

    match daemon::run(config, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
