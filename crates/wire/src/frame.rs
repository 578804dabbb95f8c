// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed frame encoding for the stream carrier.

use crate::message::{Message, MessageBody, MessageKind, ProtocolInfo};
use crate::WireError;
use fluxion_buffer::Options;
use fluxion_core::Event;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame body size (200 MB).
pub const MAX_FRAME_SIZE: usize = 200 * 1024 * 1024;

/// Frame body layout: `type(u8)` ∥ `unit_id(i32 BE)` ∥ payload.
const HEADER_LEN: usize = 5;

/// Encode a message body (without the length prefix).
pub fn encode_body(msg: &Message) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(32);
    buf.push(msg.kind().as_u8());
    buf.extend_from_slice(&msg.unit_id.to_be_bytes());
    match &msg.body {
        MessageBody::InfoRequest
        | MessageBody::Start
        | MessageBody::Stop
        | MessageBody::Terminated => {}
        MessageBody::InfoResponse(info) => buf.extend(rmp_serde::to_vec_named(info)?),
        MessageBody::BufferOption(opts) => buf.extend(rmp_serde::to_vec_named(opts)?),
        // Configure bytes are already MessagePack; carried verbatim.
        MessageBody::Configure(bytes) => buf.extend_from_slice(bytes),
        MessageBody::Event(ev) | MessageBody::EventChain(ev) => {
            buf.extend(rmp_serde::to_vec_named(ev)?)
        }
    }
    if buf.len() > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge { size: buf.len(), max: MAX_FRAME_SIZE });
    }
    Ok(buf)
}

/// Decode a frame body produced by [`encode_body`].
pub fn decode_body(bytes: &[u8]) -> Result<Message, WireError> {
    if bytes.len() < HEADER_LEN {
        return Err(WireError::Truncated(bytes.len()));
    }
    let kind = MessageKind::from_u8(bytes[0]).ok_or(WireError::UnknownType(bytes[0]))?;
    let unit_id = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let payload = &bytes[HEADER_LEN..];

    let body = match kind {
        MessageKind::InfoRequest => MessageBody::InfoRequest,
        MessageKind::Start => MessageBody::Start,
        MessageKind::Stop => MessageBody::Stop,
        MessageKind::Terminated => MessageBody::Terminated,
        MessageKind::InfoResponse => {
            let info: ProtocolInfo = rmp_serde::from_slice(payload)?;
            MessageBody::InfoResponse(info)
        }
        MessageKind::BufferOption => {
            let opts: Options = rmp_serde::from_slice(payload)?;
            MessageBody::BufferOption(opts)
        }
        MessageKind::Configure => MessageBody::Configure(payload.to_vec()),
        MessageKind::Event => MessageBody::Event(rmp_serde::from_slice::<Event>(payload)?),
        MessageKind::EventChain => {
            MessageBody::EventChain(rmp_serde::from_slice::<Event>(payload)?)
        }
    };
    Ok(Message { unit_id, body })
}

/// Read one length-prefixed frame. A clean EOF before the length prefix
/// maps to [`WireError::ConnectionClosed`]; EOF inside a frame is a
/// protocol error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, WireError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::ConnectionClosed);
        }
        Err(e) => return Err(WireError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge { size: len, max: MAX_FRAME_SIZE });
    }

    let mut buf = vec![0u8; len];
    match reader.read_exact(&mut buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::Truncated(len));
        }
        Err(e) => return Err(WireError::Io(e)),
    }
    decode_body(&buf)
}

/// Write one length-prefixed frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Message,
) -> Result<(), WireError> {
    let body = encode_body(msg)?;
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
