// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-side plugin host: one event loop dispatching protocol messages
//! to exec units.
//!
//! Units are created on first sight of a new `unit_id` and walk
//! `Uninitialized → Configured → Running → Stopped`. An init or start
//! failure terminates the unit, never the process. After a `Stop` has
//! been seen and every unit is terminal, the host sends `Terminated` and
//! exits.

use crate::env::Env;
use crate::traits::{Factory, FilterPlugin, InputPlugin, OutputPlugin, Payload, PluginSpec};
use async_trait::async_trait;
use fluxion_buffer::{Handler, Memory, Options, WriteError};
use fluxion_core::Event;
use fluxion_wire::{
    Message, MessageBody, Pipe, PipeReader, PipeWriter, ProtocolInfo, WireError,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Host-fatal errors; per-event plugin errors never surface here.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("pipe error: {0}")]
    Wire(#[from] WireError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Uninitialized,
    Configured,
    Running,
    Stopped,
    /// Init or start failed; the unit ignores everything but counts as
    /// terminal for shutdown.
    Failed,
}

impl UnitState {
    fn is_terminal(self) -> bool {
        matches!(self, UnitState::Stopped | UnitState::Failed)
    }
}

type SharedOutput = Arc<Mutex<Box<dyn OutputPlugin>>>;

/// Buffer handler delegating chunk writes to the output plugin. Shares
/// the plugin with the event path (encode) behind one async mutex.
struct OutputHandler {
    plugin: SharedOutput,
}

#[async_trait]
impl Handler<Payload> for OutputHandler {
    async fn write(&mut self, items: &[Payload]) -> Result<(), WriteError> {
        self.plugin.lock().await.write(items).await
    }
}

enum UnitRole {
    Input(Box<dyn InputPlugin>),
    Filter(Box<dyn FilterPlugin>),
    Output { plugin: SharedOutput, buffer: Option<Memory<Payload>> },
}

struct Unit {
    id: i32,
    state: UnitState,
    role: UnitRole,
    env: Option<Env>,
}

impl Unit {
    fn new(id: i32, spec: PluginSpec) -> Self {
        let role = match spec {
            PluginSpec::Input(p) => UnitRole::Input(p),
            PluginSpec::Filter(p) => UnitRole::Filter(p),
            PluginSpec::Output(p) => {
                UnitRole::Output { plugin: Arc::new(Mutex::new(p)), buffer: None }
            }
        };
        Self { id, state: UnitState::Uninitialized, role, env: None }
    }
}

/// Plugin host. Drives every exec unit of one plugin kind.
pub struct Host {
    plugin_name: String,
    factory: Factory,
    reader: PipeReader,
    writer: PipeWriter,
    units: HashMap<i32, Unit>,
    stopping: bool,
}

impl Host {
    pub fn new(plugin_name: impl Into<String>, factory: Factory, pipe: Pipe) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            factory,
            reader: pipe.reader,
            writer: pipe.writer,
            units: HashMap::new(),
            stopping: false,
        }
    }

    /// Run until the engine goes away or all units have stopped.
    pub async fn run(mut self) -> Result<(), HostError> {
        loop {
            let msg = match self.reader.read().await {
                Ok(msg) => msg,
                Err(WireError::ConnectionClosed) | Err(WireError::MailboxClosed) => {
                    debug!(plugin = %self.plugin_name, "engine pipe closed");
                    return Ok(());
                }
                Err(err) if err.is_protocol() => {
                    warn!(plugin = %self.plugin_name, error = %err, "protocol error; resetting");
                    return Err(HostError::Wire(err));
                }
                Err(err) => return Err(HostError::Wire(err)),
            };
            self.dispatch(msg).await?;

            let all_terminal = self.stopping
                && !self.units.is_empty()
                && self.units.values().all(|u| u.state.is_terminal());
            if all_terminal {
                self.writer.write(&Message::new(0, MessageBody::Terminated)).await?;
                return Ok(());
            }
        }
    }

    async fn dispatch(&mut self, msg: Message) -> Result<(), HostError> {
        if msg.body == MessageBody::InfoRequest {
            let reply =
                Message::new(msg.unit_id, MessageBody::InfoResponse(ProtocolInfo::default()));
            self.writer.write(&reply).await?;
            return Ok(());
        }
        if msg.body == MessageBody::Stop {
            self.stopping = true;
        }

        let factory = Arc::clone(&self.factory);
        let unit_id = msg.unit_id;
        let kind = msg.kind();
        let unit = self
            .units
            .entry(unit_id)
            .or_insert_with(|| Unit::new(unit_id, factory()));
        let writer = self.writer.clone();
        let plugin_name = self.plugin_name.as_str();

        match msg.body {
            MessageBody::BufferOption(opts) => handle_buffer_option(unit, opts, plugin_name),
            MessageBody::Configure(bytes) => {
                handle_configure(unit, bytes, plugin_name, writer).await
            }
            MessageBody::Start => handle_start(unit, plugin_name).await,
            MessageBody::Event(ev) => handle_event(unit, ev, &writer).await,
            MessageBody::Stop => handle_stop(unit, plugin_name).await,
            MessageBody::InfoRequest => {} // handled above
            MessageBody::InfoResponse(_)
            | MessageBody::Terminated
            | MessageBody::EventChain(_) => {
                warn!(
                    plugin = plugin_name,
                    unit = unit_id,
                    kind = ?kind,
                    "unexpected message at plugin host"
                );
            }
        }
        Ok(())
    }
}

fn handle_buffer_option(unit: &mut Unit, opts: Options, plugin_name: &str) {
    if unit.state != UnitState::Uninitialized {
        warn!(plugin = plugin_name, unit = unit.id, "BufferOption after configure; ignored");
        return;
    }
    match &mut unit.role {
        UnitRole::Output { plugin, buffer } => {
            let handler = OutputHandler { plugin: Arc::clone(plugin) };
            *buffer = Some(Memory::new(&opts, handler));
        }
        _ => {
            warn!(plugin = plugin_name, unit = unit.id, "BufferOption for non-output; ignored");
        }
    }
}

async fn handle_configure(unit: &mut Unit, bytes: Vec<u8>, plugin_name: &str, writer: PipeWriter) {
    if unit.state != UnitState::Uninitialized {
        warn!(plugin = plugin_name, unit = unit.id, state = ?unit.state, "Configure ignored");
        return;
    }
    let env = Env::new(unit.id, plugin_name, bytes, writer);
    let result = match &mut unit.role {
        UnitRole::Input(p) => p.init(&env),
        UnitRole::Filter(p) => p.init(&env),
        UnitRole::Output { plugin, .. } => plugin.lock().await.init(&env),
    };
    match result {
        Ok(()) => {
            unit.state = UnitState::Configured;
            unit.env = Some(env);
        }
        Err(err) => {
            env.log().critical(format!("init failed: {err}")).await;
            unit.state = UnitState::Failed;
        }
    }
}

async fn handle_start(unit: &mut Unit, plugin_name: &str) {
    if unit.state != UnitState::Configured {
        warn!(plugin = plugin_name, unit = unit.id, state = ?unit.state, "Start ignored");
        return;
    }
    let result = match &mut unit.role {
        UnitRole::Input(p) => p.start(),
        UnitRole::Filter(p) => p.start(),
        UnitRole::Output { plugin, .. } => plugin.lock().await.start(),
    };
    match result {
        Ok(()) => unit.state = UnitState::Running,
        Err(err) => {
            if let Some(env) = &unit.env {
                env.log().critical(format!("start failed: {err}")).await;
            }
            unit.state = UnitState::Failed;
        }
    }
}

async fn handle_event(unit: &mut Unit, ev: Event, writer: &PipeWriter) {
    if unit.state != UnitState::Running {
        debug!(unit = unit.id, state = ?unit.state, "event for non-running unit dropped");
        return;
    }
    match &mut unit.role {
        UnitRole::Filter(p) => {
            let out = match p.filter(ev.clone()) {
                Ok(None) => return,
                Ok(Some(out)) => out,
                Err(err) => {
                    // Pass the original event on; a broken filter must
                    // not lose data.
                    if let Some(env) = &unit.env {
                        env.log().warning(format!("filter error: {err}")).await;
                    }
                    ev
                }
            };
            let msg = Message::new(unit.id, MessageBody::EventChain(out));
            if let Err(err) = writer.write(&msg).await {
                warn!(unit = unit.id, error = %err, "failed to send filtered event");
            }
        }
        UnitRole::Output { plugin, buffer } => {
            let encoded = plugin.lock().await.encode(&ev);
            match (encoded, buffer.as_ref()) {
                (Ok(payload), Some(buffer)) => {
                    if let Err(err) = buffer.push(payload) {
                        warn!(unit = unit.id, error = %err, "buffer rejected event");
                    }
                }
                (Ok(_), None) => {
                    warn!(unit = unit.id, "output has no buffer; event dropped");
                }
                (Err(err), _) => {
                    if let Some(env) = &unit.env {
                        env.log().warning(format!("encode error: {err}")).await;
                    }
                }
            }
        }
        // Inputs do not consume events.
        UnitRole::Input(_) => {}
    }
}

async fn handle_stop(unit: &mut Unit, plugin_name: &str) {
    if unit.state.is_terminal() {
        return;
    }
    match &mut unit.role {
        UnitRole::Input(p) => {
            if let Err(err) = p.stop() {
                warn!(plugin = plugin_name, unit = unit.id, error = %err, "stop failed");
            }
        }
        UnitRole::Filter(p) => {
            if let Err(err) = p.stop() {
                warn!(plugin = plugin_name, unit = unit.id, error = %err, "stop failed");
            }
        }
        UnitRole::Output { plugin, buffer } => {
            // Synchronous drain: flush everything still queued before the
            // process goes away.
            if let Some(buffer) = buffer.take() {
                buffer.close().await;
            }
            if let Err(err) = plugin.lock().await.stop() {
                warn!(plugin = plugin_name, unit = unit.id, error = %err, "stop failed");
            }
        }
    }
    unit.state = UnitState::Stopped;
}

/// Entrypoint for `fluxion-<name>` binaries: stdin carries engine →
/// plugin traffic, stdout the reverse, stderr passes through.
pub async fn run_stdio(plugin_name: &str, factory: Factory) -> Result<(), HostError> {
    let pipe = Pipe::from_stream(tokio::io::stdin(), tokio::io::stdout());
    Host::new(plugin_name, factory, pipe).run().await
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
