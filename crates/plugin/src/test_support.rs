// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for testing plugin implementations without a running host.

use crate::env::Env;
use fluxion_wire::{Pipe, PipeReader};
use serde::Serialize;

/// Build an [`Env`] over an in-process pipe. The returned reader is the
/// engine side: everything the plugin emits or logs shows up there.
pub fn env_with_pipe(unit_id: i32, plugin_name: &str, config: &impl Serialize) -> (Env, PipeReader) {
    let (engine_side, plugin_side) = Pipe::in_process_pair();
    let bytes = rmp_serde::to_vec_named(config).unwrap_or_default();
    (
        Env::new(unit_id, plugin_name, bytes, plugin_side.writer),
        engine_side.reader,
    )
}
