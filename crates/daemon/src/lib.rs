// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fluxion-daemon: configuration loading and engine bring-up for the
//! `fluxiond` binary.

pub mod config;

pub use config::{build_engine, Config, ConfigError, PluginConf};
