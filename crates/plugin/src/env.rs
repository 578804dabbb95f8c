// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-unit environment handed to plugins at `init`.

use crate::PluginError;
use fluxion_core::{log_tag, record, Event, LogLevel};
use fluxion_wire::{Message, MessageBody, PipeWriter};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// What a plugin sees of the outside world: its configuration bytes, an
/// emit path back to the engine, and a pipeline-visible logger.
#[derive(Clone)]
pub struct Env {
    unit_id: i32,
    plugin_name: Arc<str>,
    config: Arc<[u8]>,
    writer: PipeWriter,
}

impl Env {
    pub(crate) fn new(
        unit_id: i32,
        plugin_name: &str,
        config: Vec<u8>,
        writer: PipeWriter,
    ) -> Self {
        Self {
            unit_id,
            plugin_name: Arc::from(plugin_name),
            config: Arc::from(config),
            writer,
        }
    }

    pub fn unit_id(&self) -> i32 {
        self.unit_id
    }

    /// Decode the opaque configuration delivered with `Configure`.
    pub fn read_config<T: DeserializeOwned>(&self) -> Result<T, PluginError> {
        Ok(rmp_serde::from_slice(&self.config)?)
    }

    /// Send an event upstream. Inputs call this from their emit tasks;
    /// the engine routes it through the filter chain.
    pub async fn emit(&self, ev: Event) -> Result<(), PluginError> {
        self.writer
            .write(&Message::new(self.unit_id, MessageBody::Event(ev)))
            .await?;
        Ok(())
    }

    /// Leveled logger emitting events on `fluxion.log.<level>`.
    pub fn log(&self) -> EventLogger {
        EventLogger {
            name: Arc::clone(&self.plugin_name),
            unit_id: self.unit_id,
            writer: self.writer.clone(),
        }
    }
}

/// Logger whose output travels the pipeline as ordinary events on the
/// reserved tag space, with record fields `name`, `level`, `message`.
#[derive(Clone)]
pub struct EventLogger {
    name: Arc<str>,
    unit_id: i32,
    writer: PipeWriter,
}

impl EventLogger {
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(plugin = &*self.name, "{message}"),
            LogLevel::Info | LogLevel::Notice => {
                tracing::info!(plugin = &*self.name, "{message}")
            }
            LogLevel::Warning => tracing::warn!(plugin = &*self.name, "{message}"),
            LogLevel::Error | LogLevel::Critical => {
                tracing::error!(plugin = &*self.name, "{message}")
            }
        }
        let ev = Event::new(
            log_tag(level),
            record! {
                "name" => &*self.name,
                "level" => level.as_str(),
                "message" => message,
            },
        );
        if self
            .writer
            .write(&Message::new(self.unit_id, MessageBody::Event(ev)))
            .await
            .is_err()
        {
            tracing::debug!(plugin = &*self.name, "log event dropped; pipe closed");
        }
    }

    pub async fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message).await;
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message).await;
    }

    pub async fn notice(&self, message: impl Into<String>) {
        self.log(LogLevel::Notice, message).await;
    }

    pub async fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message).await;
    }

    pub async fn critical(&self, message: impl Into<String>) {
        self.log(LogLevel::Critical, message).await;
    }
}
