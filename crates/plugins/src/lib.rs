// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fluxion-plugins: the built-in sources, filters, and sinks.
//!
//! Every plugin here ships both ways: as a `fluxion-<name>` binary the
//! supervisor can spawn, and through [`registry`] for in-process
//! execution inside the engine.

pub mod file;
pub mod forward;
pub mod http;
pub mod parser;
pub mod record;
pub mod stdout;
pub mod tail;
pub mod tcp;

use fluxion_plugin::{factory, PluginSpec, Registry};
use std::process::ExitCode;

/// All built-in plugins, keyed by full name (`in-tail`, `out-stdout`, …).
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register("in-tail", factory(|| PluginSpec::Input(Box::new(tail::TailInput::new()))));
    registry.register("in-tcp", factory(|| PluginSpec::Input(Box::new(tcp::TcpInput::new()))));
    registry.register(
        "filter-record",
        factory(|| PluginSpec::Filter(Box::new(record::RecordFilter::new()))),
    );
    registry.register(
        "out-stdout",
        factory(|| PluginSpec::Output(Box::new(stdout::StdoutOutput::new()))),
    );
    registry
        .register("out-file", factory(|| PluginSpec::Output(Box::new(file::FileOutput::new()))));
    registry.register(
        "out-forward",
        factory(|| PluginSpec::Output(Box::new(forward::ForwardOutput::new()))),
    );
    registry
        .register("out-http", factory(|| PluginSpec::Output(Box::new(http::HttpOutput::new()))));
    registry
}

/// Shared main for the `fluxion-<name>` binaries: tracing to stderr
/// (stdout is the IPC channel), then the stdio host loop.
pub async fn plugin_main(name: &str) -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(plugin_factory) = registry().get(name) else {
        tracing::error!(plugin = name, "unknown plugin");
        return ExitCode::FAILURE;
    };
    match fluxion_plugin::run_stdio(name, plugin_factory).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(plugin = name, error = %err, "plugin host failed");
            ExitCode::FAILURE
        }
    }
}
