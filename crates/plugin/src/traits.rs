// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin capability traits and the closed dispatch set.

use crate::env::Env;
use crate::PluginError;
use async_trait::async_trait;
use fluxion_buffer::{Measured, WriteError};
use fluxion_core::Event;

/// Encoded sink item: what an output's `encode` produces and its `write`
/// consumes, sized so the buffer can enforce chunk bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Bytes(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl Measured for Payload {
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Base lifecycle implemented by every plugin. `start` and `stop`
/// default to no-ops.
pub trait Plugin: Send + 'static {
    /// Decode configuration from `env` and prepare resources. Called
    /// once per exec unit, before `start`.
    fn init(&mut self, env: &Env) -> Result<(), PluginError>;

    /// Begin producing. Inputs spawn their emit tasks here.
    fn start(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Event source. Emits through the [`Env`] handed to `init`; has no
/// extra methods.
pub trait InputPlugin: Plugin {}

/// Event transformer. `Ok(None)` drops the event.
pub trait FilterPlugin: Plugin {
    fn filter(&mut self, ev: Event) -> Result<Option<Event>, PluginError>;
}

/// Event sink. `encode` runs on the event path; `write` runs on the
/// buffer's flush task with a whole chunk at a time.
#[async_trait]
pub trait OutputPlugin: Plugin {
    fn encode(&self, ev: &Event) -> Result<Payload, PluginError>;

    async fn write(&mut self, items: &[Payload]) -> Result<(), WriteError>;
}

/// Closed set of plugin shapes; the host dispatches over this, never
/// over downcasts.
pub enum PluginSpec {
    Input(Box<dyn InputPlugin>),
    Filter(Box<dyn FilterPlugin>),
    Output(Box<dyn OutputPlugin>),
}

/// Creates one plugin value per exec unit.
pub type Factory = std::sync::Arc<dyn Fn() -> PluginSpec + Send + Sync>;

/// Wrap a constructor as a [`Factory`].
pub fn factory(f: impl Fn() -> PluginSpec + Send + Sync + 'static) -> Factory {
    std::sync::Arc::new(f)
}
