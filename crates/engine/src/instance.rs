// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-side mirror of one plugin process (or embedded host).
//!
//! Owns the pipe pair for its child and the map of exec units. The
//! reader loop decodes child messages: handshake responses re-run unit
//! start-up, input events enter the filter chain, and chained filter
//! output is routed to the next stage or out to the sinks.

use crate::engine::Dispatch;
use crate::unit::{ExecUnit, SharedWriter};
use fluxion_core::LogLevel;
use fluxion_wire::{Message, MessageBody, Pipe, PipeReader, WireError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, warn};

pub(crate) struct Instance {
    name: String,
    writer: SharedWriter,
    /// Keyed by unit id; iteration order is creation order.
    units: Mutex<BTreeMap<i32, Arc<ExecUnit>>>,
    dispatch: OnceLock<Arc<Dispatch>>,
    terminated_tx: watch::Sender<bool>,
}

impl Instance {
    pub fn new(name: &str) -> Arc<Self> {
        let (terminated_tx, _) = watch::channel(false);
        Arc::new(Self {
            name: name.to_string(),
            writer: SharedWriter::default(),
            units: Mutex::new(BTreeMap::new()),
            dispatch: OnceLock::new(),
            terminated_tx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }

    pub fn add_unit(&self, unit: Arc<ExecUnit>) {
        self.units.lock().insert(unit.id(), unit);
    }

    pub fn units(&self) -> Vec<Arc<ExecUnit>> {
        self.units.lock().values().cloned().collect()
    }

    pub fn set_dispatch(&self, dispatch: Arc<Dispatch>) {
        let _ = self.dispatch.set(dispatch);
    }

    pub fn dispatch(&self) -> Option<&Arc<Dispatch>> {
        self.dispatch.get()
    }

    /// Install fresh pipe endpoints and restart the reader loop. Called
    /// by the supervisor's prepare hook on every (re)spawn, and once at
    /// start-up for embedded plugins.
    pub fn install_pipe(self: &Arc<Self>, pipe: Pipe) {
        self.writer.install(pipe.writer);
        let instance = Arc::clone(self);
        tokio::spawn(read_loop(instance, pipe.reader));
    }

    /// Open the handshake; the `InfoResponse` triggers unit start-up.
    pub fn send_info_request(&self) {
        let writer = self.writer.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            if let Err(err) = writer.send(&Message::new(0, MessageBody::InfoRequest)).await {
                warn!(plugin = %name, error = %err, "info request failed");
            }
        });
    }

    pub async fn broadcast_stop(&self) {
        for unit in self.units() {
            if let Err(err) = unit.send_stop().await {
                debug!(plugin = %self.name, unit = unit.id(), error = %err, "stop not delivered");
            }
        }
    }

    /// Wait until the child (or embedded host) reports `Terminated`.
    pub async fn wait_terminated(&self) {
        let mut rx = self.terminated_tx.subscribe();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn handle(&self, msg: Message) {
        match msg.body {
            MessageBody::InfoResponse(info) => {
                debug!(plugin = %self.name, proto_ver = info.proto_ver, "plugin handshake");
                for unit in self.units() {
                    if let Err(err) = unit.start().await {
                        self.log_critical(format!(
                            "unit {} start-up failed: {err}",
                            unit.id()
                        ));
                    }
                }
            }
            MessageBody::Event(ev) => match self.dispatch.get() {
                Some(dispatch) => dispatch.filter(ev),
                None => debug!(plugin = %self.name, "event before engine start; dropped"),
            },
            MessageBody::EventChain(ev) => {
                let unit = self.units.lock().get(&msg.unit_id).cloned();
                match unit {
                    Some(unit) => {
                        if let Some(ev) = unit.route_chain(ev) {
                            match self.dispatch.get() {
                                Some(dispatch) => dispatch.emit(ev),
                                None => debug!(plugin = %self.name, "chained event dropped"),
                            }
                        }
                    }
                    None => {
                        warn!(plugin = %self.name, unit = msg.unit_id, "chain from unknown unit")
                    }
                }
            }
            MessageBody::Terminated => {
                let _ = self.terminated_tx.send(true);
            }
            other => {
                warn!(plugin = %self.name, kind = ?other.kind(), "unexpected message from plugin");
            }
        }
    }

    fn log_critical(&self, message: String) {
        match self.dispatch.get() {
            Some(dispatch) => dispatch.log("engine", LogLevel::Critical, message),
            None => tracing::error!(plugin = %self.name, "{message}"),
        }
    }
}

async fn read_loop(instance: Arc<Instance>, mut reader: PipeReader) {
    loop {
        match reader.read().await {
            Ok(msg) => instance.handle(msg).await,
            Err(WireError::ConnectionClosed) | Err(WireError::MailboxClosed) => {
                debug!(plugin = %instance.name, "plugin pipe closed");
                return;
            }
            Err(err) => {
                // Protocol corruption: abandon the stream; the
                // supervisor respawns the child with a fresh pipe.
                warn!(plugin = %instance.name, error = %err, "pipe error; resetting connection");
                return;
            }
        }
    }
}
