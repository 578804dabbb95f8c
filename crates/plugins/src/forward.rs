// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! out-forward: ship events to a remote collector over TCP.
//!
//! Each item is a MessagePack `[tag, unix_seconds, record]` triple. The
//! connection is established lazily on the first write and dropped on
//! any failure; the buffer's retry machinery handles the rest.

use async_trait::async_trait;
use fluxion_buffer::WriteError;
use fluxion_core::Event;
use fluxion_plugin::{Env, OutputPlugin, Payload, Plugin, PluginError};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connect and write deadline for the remote sink.
const IO_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize)]
struct ForwardConfig {
    /// `host:port` of the downstream collector.
    server: String,
}

pub struct ForwardOutput {
    conf: ForwardConfig,
    conn: Option<TcpStream>,
}

impl ForwardOutput {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { conf: ForwardConfig::default(), conn: None }
    }

    async fn connect(&mut self) -> Result<(), WriteError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let stream = timeout(IO_DEADLINE, TcpStream::connect(&self.conf.server))
            .await
            .map_err(|_| WriteError::fresh("connect timed out"))?
            .map_err(WriteError::fresh)?;
        self.conn = Some(stream);
        Ok(())
    }
}

impl Plugin for ForwardOutput {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        self.conf = env.read_config()?;
        if self.conf.server.is_empty() {
            return Err(PluginError::msg("out-forward requires a server"));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        self.conn = None;
        Ok(())
    }
}

#[async_trait]
impl OutputPlugin for ForwardOutput {
    fn encode(&self, ev: &Event) -> Result<Payload, PluginError> {
        let frame = (&ev.tag, ev.time.as_secs(), &ev.record);
        let bytes = rmp_serde::to_vec(&frame)
            .map_err(|err| PluginError::msg(format!("unencodable event: {err}")))?;
        Ok(Payload::Bytes(bytes))
    }

    async fn write(&mut self, items: &[Payload]) -> Result<(), WriteError> {
        self.connect().await?;
        let result = match self.conn.as_mut() {
            Some(conn) => send_all(conn, items).await,
            None => Err(WriteError::fresh("not connected")),
        };
        if result.is_err() {
            // A broken stream is not reusable; reconnect on retry.
            self.conn = None;
        }
        result
    }
}

async fn send_all(conn: &mut TcpStream, items: &[Payload]) -> Result<(), WriteError> {
    for (n, item) in items.iter().enumerate() {
        match timeout(IO_DEADLINE, conn.write_all(item.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(WriteError::new(n, err)),
            Err(_) => return Err(WriteError::new(n, "write timed out")),
        }
    }
    match timeout(IO_DEADLINE, conn.flush()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(WriteError::new(items.len(), err)),
        Err(_) => Err(WriteError::new(items.len(), "flush timed out")),
    }
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
