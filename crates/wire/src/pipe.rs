// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplex message carriers.
//!
//! The read half is owned by a single reader task; the write half clones
//! freely, serialising stream writes behind an async mutex. Read and
//! write never contend with each other, so duplex use is concurrent.

use crate::frame::{read_frame, write_frame};
use crate::message::Message;
use crate::WireError;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};

/// Mailbox depth for the in-process carrier.
pub const IN_PROCESS_CAPACITY: usize = 100;

/// Reading half of a pipe.
pub struct PipeReader(ReaderInner);

enum ReaderInner {
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    Mailbox(mpsc::Receiver<Message>),
}

impl PipeReader {
    /// Read the next message. `ConnectionClosed` / `MailboxClosed` signal
    /// a clean end of stream.
    pub async fn read(&mut self) -> Result<Message, WireError> {
        match &mut self.0 {
            ReaderInner::Stream(r) => read_frame(r).await,
            ReaderInner::Mailbox(rx) => rx.recv().await.ok_or(WireError::MailboxClosed),
        }
    }
}

/// Writing half of a pipe. Cheap to clone; stream writes are serialised.
#[derive(Clone)]
pub struct PipeWriter(WriterInner);

#[derive(Clone)]
enum WriterInner {
    Stream(Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>),
    Mailbox(mpsc::Sender<Message>),
}

impl PipeWriter {
    pub async fn write(&self, msg: &Message) -> Result<(), WireError> {
        match &self.0 {
            WriterInner::Stream(w) => {
                let mut w = w.lock().await;
                write_frame(&mut *w, msg).await
            }
            WriterInner::Mailbox(tx) => {
                tx.send(msg.clone()).await.map_err(|_| WireError::MailboxClosed)
            }
        }
    }
}

/// One endpoint of a duplex connection.
pub struct Pipe {
    pub reader: PipeReader,
    pub writer: PipeWriter,
}

impl Pipe {
    /// Wrap a byte stream pair (e.g. a child's stdout/stdin, or this
    /// process's stdin/stdout on the plugin side).
    pub fn from_stream(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: PipeReader(ReaderInner::Stream(Box::new(reader))),
            writer: PipeWriter(WriterInner::Stream(Arc::new(Mutex::new(Box::new(writer))))),
        }
    }

    /// Crossed in-process mailbox pair for embedded plugins. Same type
    /// discipline as the stream carrier, no serialization.
    pub fn in_process_pair() -> (Pipe, Pipe) {
        let (a_tx, a_rx) = mpsc::channel(IN_PROCESS_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(IN_PROCESS_CAPACITY);
        let left = Pipe {
            reader: PipeReader(ReaderInner::Mailbox(a_rx)),
            writer: PipeWriter(WriterInner::Mailbox(b_tx)),
        };
        let right = Pipe {
            reader: PipeReader(ReaderInner::Mailbox(b_rx)),
            writer: PipeWriter(WriterInner::Mailbox(a_tx)),
        };
        (left, right)
    }
}

#[cfg(test)]
#[path = "pipe_tests.rs"]
mod tests;
