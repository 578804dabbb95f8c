// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed messages exchanged between the engine and plugin hosts.

use fluxion_buffer::Options;
use fluxion_core::Event;
use serde::{Deserialize, Serialize};

/// Version reported in [`ProtocolInfo`].
pub const PROTOCOL_VERSION: u32 = 1;

/// Handshake payload sent by a plugin host in response to `InfoRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInfo {
    pub proto_ver: u32,
}

impl Default for ProtocolInfo {
    fn default() -> Self {
        Self { proto_ver: PROTOCOL_VERSION }
    }
}

/// Message type byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    InfoRequest = 0,
    InfoResponse = 1,
    BufferOption = 2,
    Configure = 3,
    Start = 4,
    Stop = 5,
    Terminated = 6,
    Event = 7,
    EventChain = 8,
}

impl MessageKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(MessageKind::InfoRequest),
            1 => Some(MessageKind::InfoResponse),
            2 => Some(MessageKind::BufferOption),
            3 => Some(MessageKind::Configure),
            4 => Some(MessageKind::Start),
            5 => Some(MessageKind::Stop),
            6 => Some(MessageKind::Terminated),
            7 => Some(MessageKind::Event),
            8 => Some(MessageKind::EventChain),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Payload, keyed by [`MessageKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    InfoRequest,
    InfoResponse(ProtocolInfo),
    BufferOption(Options),
    /// Opaque plugin-specific configuration, itself MessagePack.
    Configure(Vec<u8>),
    Start,
    Stop,
    Terminated,
    Event(Event),
    /// Filter output routed back to the next stage.
    EventChain(Event),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::InfoRequest => MessageKind::InfoRequest,
            MessageBody::InfoResponse(_) => MessageKind::InfoResponse,
            MessageBody::BufferOption(_) => MessageKind::BufferOption,
            MessageBody::Configure(_) => MessageKind::Configure,
            MessageBody::Start => MessageKind::Start,
            MessageBody::Stop => MessageKind::Stop,
            MessageBody::Terminated => MessageKind::Terminated,
            MessageBody::Event(_) => MessageKind::Event,
            MessageBody::EventChain(_) => MessageKind::EventChain,
        }
    }
}

/// One framed message: destination exec unit plus typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub unit_id: i32,
    pub body: MessageBody,
}

impl Message {
    pub fn new(unit_id: i32, body: MessageBody) -> Self {
        Self { unit_id, body }
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
