// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fluxion-engine: the pipeline core.
//!
//! The engine owns one [`Instance`](instance::Instance) per distinct
//! plugin name, one exec unit per configuration block, tag routers for
//! output groups and the filter chain, and a process supervisor for
//! plugins that run as `fluxion-<name>` children. Embedded plugins run
//! in-process over mailbox pipes with the same protocol.

mod engine;
mod instance;
pub mod router;
mod supervisor;
mod unit;

pub use engine::Engine;
pub use router::{RouterError, TagRouter};
pub use supervisor::RestartPolicy;

use fluxion_wire::WireError;
use thiserror::Error;

/// Engine-level failures. Registration errors are fatal at startup;
/// send failures during operation feed the pending-queue machinery.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no such buffer defined: {0}")]
    UnknownBuffer(String),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("plugin process not connected")]
    NotConnected,

    #[error("pipe error: {0}")]
    Wire(#[from] WireError),

    #[error("engine already started")]
    AlreadyStarted,
}
