// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-side exec unit: one configured instance of a plugin.
//!
//! Events flow through an unbounded channel into the unit's pending
//! loop, which forwards them to the child over the instance's pipe. When
//! a send fails (child down or restarting) the event moves to a bounded
//! pending list. Each term increment, one per child (re)start, replays
//! the pending list in FIFO order before any newly-emitted event.

use crate::router::{RouterError, TagRouter};
use crate::EngineError;
use fluxion_buffer::Options;
use fluxion_core::Event;
use fluxion_wire::{Message, MessageBody, PipeWriter};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Upper bound on events buffered while the child is down. Oldest events
/// are dropped first on overflow.
pub(crate) const PENDING_CAPACITY: usize = 100_000;

/// Handle to the current pipe writer of a plugin process. Swapped by the
/// supervisor's prepare hook on every (re)spawn; `None` while the child
/// is down.
#[derive(Clone, Default)]
pub(crate) struct SharedWriter(Arc<RwLock<Option<PipeWriter>>>);

impl SharedWriter {
    pub fn install(&self, writer: PipeWriter) {
        *self.0.write() = Some(writer);
    }

    pub async fn send(&self, msg: &Message) -> Result<(), EngineError> {
        let writer = self.0.read().clone();
        match writer {
            Some(writer) => Ok(writer.write(msg).await?),
            None => Err(EngineError::NotConnected),
        }
    }
}

/// One configuration block of a plugin, owned by exactly one instance.
pub(crate) struct ExecUnit {
    id: i32,
    plugin_name: String,
    config: Vec<u8>,
    buffer: Option<Options>,
    writer: SharedWriter,
    /// Routes this filter's output to the next filter stage, if any.
    next_filters: RwLock<TagRouter<Arc<ExecUnit>>>,
    term_tx: watch::Sender<u64>,
    events_tx: mpsc::UnboundedSender<Event>,
}

impl ExecUnit {
    /// Create the unit and spawn its pending loop.
    pub fn new(
        id: i32,
        plugin_name: &str,
        config: Vec<u8>,
        buffer: Option<Options>,
        writer: SharedWriter,
    ) -> Arc<Self> {
        let (term_tx, term_rx) = watch::channel(0u64);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let unit = Arc::new(Self {
            id,
            plugin_name: plugin_name.to_string(),
            config,
            buffer,
            writer: writer.clone(),
            next_filters: RwLock::new(TagRouter::new()),
            term_tx,
            events_tx,
        });
        tokio::spawn(pending_loop(
            id,
            unit.plugin_name.clone(),
            writer,
            events_rx,
            term_rx,
        ));
        unit
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Send the start-up sequence to the child and open a new term,
    /// which triggers pending-queue replay.
    pub async fn start(&self) -> Result<(), EngineError> {
        if let Some(opts) = &self.buffer {
            self.writer
                .send(&Message::new(self.id, MessageBody::BufferOption(opts.clone())))
                .await?;
        }
        self.writer
            .send(&Message::new(self.id, MessageBody::Configure(self.config.clone())))
            .await?;
        self.writer.send(&Message::new(self.id, MessageBody::Start)).await?;
        self.term_tx.send_modify(|term| *term += 1);
        Ok(())
    }

    pub async fn send_stop(&self) -> Result<(), EngineError> {
        self.writer.send(&Message::new(self.id, MessageBody::Stop)).await
    }

    /// Queue an event for delivery. Never blocks; the pending loop owns
    /// retry-across-restart semantics.
    pub fn emit(&self, ev: Event) {
        if self.events_tx.send(ev).is_err() {
            warn!(unit = self.id, plugin = %self.plugin_name, "pending loop gone; event dropped");
        }
    }

    /// Register the next filter stage for events this filter emits.
    pub fn add_next_filter(&self, pattern: &str, next: Arc<ExecUnit>) -> Result<(), RouterError> {
        self.next_filters.write().add(pattern, next)
    }

    /// Route a chained (filter-output) event to the next stage, if any.
    /// Returns the event back when no stage matches.
    pub fn route_chain(&self, ev: Event) -> Option<Event> {
        match self.next_filters.read().route(&ev.tag) {
            Some(next) => {
                next.emit(ev);
                None
            }
            None => Some(ev),
        }
    }
}

async fn pending_loop(
    unit_id: i32,
    plugin_name: String,
    writer: SharedWriter,
    mut events_rx: mpsc::UnboundedReceiver<Event>,
    mut term_rx: watch::Receiver<u64>,
) {
    let mut pending: VecDeque<Event> = VecDeque::new();
    let mut dropped: u64 = 0;
    let mut wait_for_term = true;

    loop {
        if wait_for_term {
            // Nothing can be delivered until the supervisor brings the
            // child (back) up.
            if term_rx.changed().await.is_err() {
                return;
            }
        }
        wait_for_term = true;

        // Replay events buffered across the restart, oldest first.
        let mut replayed = true;
        while let Some(ev) = pending.front() {
            if send_event(&writer, unit_id, ev).await.is_err() {
                replayed = false;
                break;
            }
            pending.pop_front();
        }
        if !replayed {
            continue;
        }
        debug!(unit = unit_id, plugin = %plugin_name, "pending queue drained");

        // Live forwarding until a send fails or the term changes again.
        loop {
            tokio::select! {
                changed = term_rx.changed() => match changed {
                    Ok(()) => {
                        wait_for_term = false;
                        break;
                    }
                    Err(_) => return,
                },
                ev = events_rx.recv() => {
                    let Some(ev) = ev else { return };
                    if send_event(&writer, unit_id, &ev).await.is_err() {
                        push_pending(&mut pending, ev, &mut dropped, unit_id, &plugin_name);
                        break;
                    }
                }
            }
        }
    }
}

async fn send_event(writer: &SharedWriter, unit_id: i32, ev: &Event) -> Result<(), EngineError> {
    writer.send(&Message::new(unit_id, MessageBody::Event(ev.clone()))).await
}

fn push_pending(
    pending: &mut VecDeque<Event>,
    ev: Event,
    dropped: &mut u64,
    unit_id: i32,
    plugin_name: &str,
) {
    if pending.len() >= PENDING_CAPACITY {
        pending.pop_front();
        *dropped += 1;
        warn!(
            unit = unit_id,
            plugin = plugin_name,
            dropped = *dropped,
            "pending queue full; dropped oldest event"
        );
    }
    pending.push_back(ev);
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;
