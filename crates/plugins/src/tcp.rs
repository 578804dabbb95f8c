// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! in-tcp: line-delimited TCP source. One event per line, every
//! connection served concurrently.

use crate::parser::LineFormat;
use fluxion_core::Event;
use fluxion_plugin::{Env, InputPlugin, Plugin, PluginError};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct TcpConfig {
    /// Listen address, e.g. `127.0.0.1:5170`.
    bind: String,
    tag: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    pattern: Option<String>,
}

struct Shared {
    env: Env,
    tag: String,
    format: LineFormat,
}

pub struct TcpInput {
    env: Option<Env>,
    conf: Option<TcpConfig>,
    format: Option<LineFormat>,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl TcpInput {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            env: None,
            conf: None,
            format: None,
            local_addr: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Address actually bound; differs from config when port 0 was asked.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Plugin for TcpInput {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        let conf: TcpConfig = env.read_config()?;
        self.format = Some(LineFormat::new(&conf.format, conf.pattern.as_deref())?);
        self.conf = Some(conf);
        self.env = Some(env.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), PluginError> {
        let conf = self.conf.take().ok_or_else(|| PluginError::msg("not initialised"))?;
        let env = self.env.clone().ok_or_else(|| PluginError::msg("not initialised"))?;
        let format = self.format.take().ok_or_else(|| PluginError::msg("not initialised"))?;

        // Bind synchronously so a bad address fails unit start-up.
        let listener = std::net::TcpListener::bind(conf.bind.as_str())?;
        listener.set_nonblocking(true)?;
        self.local_addr = listener.local_addr().ok();
        let listener = TcpListener::from_std(listener)?;

        let shared = Arc::new(Shared { env, tag: conf.tag, format });
        tokio::spawn(accept_loop(listener, shared, self.cancel.clone()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        self.cancel.cancel();
        Ok(())
    }
}

impl InputPlugin for TcpInput {}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    tokio::spawn(serve(stream, Arc::clone(&shared), cancel.clone()));
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            },
        }
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>, cancel: CancellationToken) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    match shared.format.parse(&line) {
                        Ok(record) => {
                            let ev = Event::new(&shared.tag, record);
                            if shared.env.emit(ev).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => shared.env.log().warning(format!("{err}")).await,
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    debug!(error = %err, "connection read failed");
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "tcp_tests.rs"]
mod tests;
