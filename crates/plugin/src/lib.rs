// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fluxion-plugin: SDK and child-side host for pipeline plugins.
//!
//! A plugin implements one of three capability shapes (input, filter, or
//! output) plus a shared `init`/`start`/`stop` base. The [`host::Host`]
//! owns one exec unit per configuration instance and drives each through
//! the engine's protocol, whether the plugin runs as a separate
//! `fluxion-<name>` process ([`run_stdio`]) or linked into the engine
//! ([`host::Host::new`] over an in-process pipe).

pub mod env;
pub mod host;
pub mod registry;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use env::{Env, EventLogger};
pub use host::{run_stdio, Host, HostError};
pub use registry::Registry;
pub use traits::{
    factory, Factory, FilterPlugin, InputPlugin, OutputPlugin, Payload, Plugin, PluginSpec,
};

use thiserror::Error;

/// Errors produced by plugin implementations.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid config: {0}")]
    Config(#[from] rmp_serde::decode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipe error: {0}")]
    Pipe(#[from] fluxion_wire::WireError),

    #[error("{0}")]
    Message(String),
}

impl PluginError {
    pub fn msg(message: impl Into<String>) -> Self {
        PluginError::Message(message.into())
    }
}
