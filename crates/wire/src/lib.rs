// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fluxion-wire: engine ↔ plugin IPC protocol.
//!
//! Wire format: 4-byte length prefix (big-endian), then
//! `type(u8)` ∥ `unit_id(i32 BE)` ∥ MessagePack payload.
//!
//! Two carriers implement the same interface: a byte stream (child
//! process stdin/stdout) and an in-process mailbox for embedded plugins.

mod frame;
mod message;
mod pipe;

pub use frame::{decode_body, encode_body, read_frame, write_frame, MAX_FRAME_SIZE};
pub use message::{Message, MessageBody, MessageKind, ProtocolInfo, PROTOCOL_VERSION};
pub use pipe::{Pipe, PipeReader, PipeWriter, IN_PROCESS_CAPACITY};

use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("truncated frame: {0} bytes")]
    Truncated(usize),

    #[error("unknown message type: {0}")]
    UnknownType(u8),

    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("in-process mailbox closed")]
    MailboxClosed,
}

impl WireError {
    /// Protocol-level corruption, as opposed to a clean close or plain IO
    /// failure. The reader logs these and resets the connection.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            WireError::FrameTooLarge { .. }
                | WireError::Truncated(_)
                | WireError::UnknownType(_)
                | WireError::Decode(_)
        )
    }
}
