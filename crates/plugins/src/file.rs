// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! out-file: append events to a file, one line per event.

use crate::stdout::format_time;
use async_trait::async_trait;
use fluxion_buffer::WriteError;
use fluxion_core::Event;
use fluxion_plugin::{Env, OutputPlugin, Payload, Plugin, PluginError};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    path: String,
}

pub struct FileOutput {
    conf: FileConfig,
}

impl FileOutput {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { conf: FileConfig::default() }
    }
}

impl Plugin for FileOutput {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        self.conf = env.read_config()?;
        if self.conf.path.is_empty() {
            return Err(PluginError::msg("out-file requires a path"));
        }
        Ok(())
    }
}

#[async_trait]
impl OutputPlugin for FileOutput {
    fn encode(&self, ev: &Event) -> Result<Payload, PluginError> {
        let record = serde_json::to_string(&ev.record)
            .map_err(|err| PluginError::msg(format!("unencodable record: {err}")))?;
        Ok(Payload::Text(format!("{}\t{}\t{}\n", format_time(ev.time), ev.tag, record)))
    }

    async fn write(&mut self, items: &[Payload]) -> Result<(), WriteError> {
        // Re-opened per chunk so external rotation just works.
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.conf.path)
            .await
            .map_err(WriteError::fresh)?;
        for (n, item) in items.iter().enumerate() {
            file.write_all(item.as_bytes()).await.map_err(|err| WriteError::new(n, err))?;
        }
        file.flush().await.map_err(|err| WriteError::new(items.len(), err))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
