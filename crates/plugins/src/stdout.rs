// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! out-stdout: human-readable lines on the engine's stderr.
//!
//! Writes to stderr rather than stdout: when the plugin runs as a child
//! process its stdout is the IPC channel, and stderr passes through to
//! the engine's terminal.

use chrono::{TimeZone, Utc};
use fluxion_core::{Event, EventTime};
use fluxion_plugin::{Env, OutputPlugin, Payload, Plugin, PluginError};
use async_trait::async_trait;
use fluxion_buffer::WriteError;
use std::io::Write;

pub(crate) fn format_time(time: EventTime) -> String {
    match Utc.timestamp_opt(time.as_secs(), time.subsec_nanos()).single() {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => time.as_nanos().to_string(),
    }
}

pub struct StdoutOutput;

impl StdoutOutput {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn line(ev: &Event) -> String {
        let record = serde_json::to_string(&ev.record).unwrap_or_else(|_| "{}".to_string());
        format!("{} {} {}\n", format_time(ev.time), ev.tag, record)
    }
}

impl Plugin for StdoutOutput {
    fn init(&mut self, _env: &Env) -> Result<(), PluginError> {
        Ok(())
    }
}

#[async_trait]
impl OutputPlugin for StdoutOutput {
    fn encode(&self, ev: &Event) -> Result<Payload, PluginError> {
        Ok(Payload::Text(Self::line(ev)))
    }

    async fn write(&mut self, items: &[Payload]) -> Result<(), WriteError> {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        for (n, item) in items.iter().enumerate() {
            out.write_all(item.as_bytes()).map_err(|err| WriteError::new(n, err))?;
        }
        out.flush().map_err(|err| WriteError::new(items.len(), err))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "stdout_tests.rs"]
mod tests;
