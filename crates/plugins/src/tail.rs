// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! in-tail: follow a file and emit one event per line.
//!
//! Remembers its read offset in an optional pos file so a restart
//! resumes where the previous run stopped. Rotation is detected on EOF
//! by inode change or shrinkage, at which point the file is re-opened
//! from the start.

use crate::parser::{LineFormat, TimeParser};
use fluxion_core::Event;
use fluxion_plugin::{Env, InputPlugin, Plugin, PluginError};
use serde::Deserialize;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct TailConfig {
    tag: String,
    path: String,
    #[serde(default)]
    pos_file: Option<String>,
    #[serde(default)]
    format: String,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    time_key: Option<String>,
    #[serde(default)]
    time_format: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    read_from_head: bool,
}

struct Worker {
    env: Env,
    tag: String,
    path: PathBuf,
    pos_file: Option<PathBuf>,
    read_from_head: bool,
    format: LineFormat,
    time: Option<TimeParser>,
}

pub struct TailInput {
    worker: Option<Worker>,
    cancel: CancellationToken,
}

impl TailInput {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { worker: None, cancel: CancellationToken::new() }
    }
}

impl Plugin for TailInput {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        let conf: TailConfig = env.read_config()?;
        let format = LineFormat::new(&conf.format, conf.pattern.as_deref())?;
        let time = match (&conf.time_key, &conf.time_format) {
            (Some(key), Some(format)) => {
                Some(TimeParser::new(key, format, conf.timezone.as_deref())?)
            }
            _ => None,
        };
        self.worker = Some(Worker {
            env: env.clone(),
            tag: conf.tag,
            path: PathBuf::from(conf.path),
            pos_file: conf.pos_file.map(PathBuf::from),
            read_from_head: conf.read_from_head,
            format,
            time,
        });
        Ok(())
    }

    fn start(&mut self) -> Result<(), PluginError> {
        let worker = self.worker.take().ok_or_else(|| PluginError::msg("not initialised"))?;
        tokio::spawn(tail_loop(worker, self.cancel.clone()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        self.cancel.cancel();
        Ok(())
    }
}

impl InputPlugin for TailInput {}

async fn load_pos(worker: &Worker) -> Option<u64> {
    let pos_file = worker.pos_file.as_ref()?;
    let content = tokio::fs::read_to_string(pos_file).await.ok()?;
    content.trim().parse().ok()
}

async fn save_pos(worker: &Worker, offset: u64) {
    if let Some(pos_file) = &worker.pos_file {
        if let Err(err) = tokio::fs::write(pos_file, offset.to_string()).await {
            debug!(pos_file = %pos_file.display(), error = %err, "pos file write failed");
        }
    }
}

async fn tail_loop(worker: Worker, cancel: CancellationToken) {
    let mut offset = match load_pos(&worker).await {
        Some(offset) => offset,
        None if worker.read_from_head => 0,
        None => tokio::fs::metadata(&worker.path).await.map(|m| m.len()).unwrap_or(0),
    };

    'reopen: loop {
        let file = loop {
            match File::open(&worker.path).await {
                Ok(file) => break file,
                Err(err) => {
                    debug!(path = %worker.path.display(), error = %err, "waiting for file");
                    tokio::select! {
                        _ = sleep(POLL_INTERVAL) => {}
                        _ = cancel.cancelled() => return,
                    }
                }
            }
        };

        let (ino, len) = match file.metadata().await {
            Ok(meta) => (meta.ino(), meta.len()),
            Err(_) => (0, 0),
        };
        if len < offset {
            // Truncated while we were away.
            offset = 0;
        }
        let mut reader = BufReader::new(file);
        if reader.seek(std::io::SeekFrom::Start(offset)).await.is_err() {
            offset = 0;
        }

        let mut line = String::new();
        let mut carry = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    save_pos(&worker, offset).await;
                    match tokio::fs::metadata(&worker.path).await {
                        Ok(meta) if meta.ino() != ino || meta.len() < offset => {
                            debug!(path = %worker.path.display(), "file rotated; reopening");
                            offset = 0;
                            continue 'reopen;
                        }
                        Err(_) => continue 'reopen,
                        _ => {}
                    }
                    tokio::select! {
                        _ = sleep(POLL_INTERVAL) => {}
                        _ = cancel.cancelled() => {
                            save_pos(&worker, offset).await;
                            return;
                        }
                    }
                }
                Ok(n) => {
                    offset += n as u64;
                    carry.push_str(&line);
                    if !carry.ends_with('\n') {
                        // Partial line; wait for the writer to finish it.
                        continue;
                    }
                    let complete = carry.trim_end_matches(['\n', '\r']).to_string();
                    carry.clear();
                    if complete.is_empty() {
                        continue;
                    }
                    if emit_line(&worker, &complete).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(path = %worker.path.display(), error = %err, "read failed; reopening");
                    tokio::select! {
                        _ = sleep(POLL_INTERVAL) => {}
                        _ = cancel.cancelled() => return,
                    }
                    continue 'reopen;
                }
            }
        }
    }
}

async fn emit_line(worker: &Worker, line: &str) -> Result<(), PluginError> {
    let record = match worker.format.parse(line) {
        Ok(record) => record,
        Err(err) => {
            worker.env.log().warning(format!("{err}")).await;
            return Ok(());
        }
    };
    let ev = match worker.time.as_ref().map(|t| t.extract(&record)) {
        Some(Ok(Some(time))) => Event::with_time(&worker.tag, time, record),
        Some(Err(err)) => {
            worker.env.log().warning(format!("{err}")).await;
            Event::new(&worker.tag, record)
        }
        _ => Event::new(&worker.tag, record),
    };
    worker.env.emit(ev).await
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
