// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fluxiond: load configuration, run the pipeline until SIGTERM/SIGINT.

use clap::Parser;
use fluxion_daemon::{build_engine, Config};
use fluxion_plugin::Registry;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fluxiond", version, about = "Fluxion event pipeline daemon")]
struct Cli {
    /// Config file
    #[arg(short = 'c', long = "config", default_value = "/etc/fluxion.toml")]
    config: PathBuf,

    /// Run built-in plugins in-process instead of spawning
    /// `fluxion-<name>` child processes
    #[arg(long)]
    embedded: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fluxiond failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), fluxion_daemon::ConfigError> {
    let config = Config::load(&cli.config)?;
    let registry = if cli.embedded { fluxion_plugins::registry() } else { Registry::new() };

    let engine = build_engine(&config, registry)?;
    engine.start()?;
    info!(config = %cli.config.display(), embedded = cli.embedded, "fluxiond ready");

    wait_for_shutdown().await;
    engine.stop().await;
    Ok(())
}

/// Block until SIGTERM or SIGINT.
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            error!(error = %err, "cannot install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = term.recv() => info!("SIGTERM received; shutting down"),
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                info!("SIGINT received; shutting down");
            }
        }
    }
}
