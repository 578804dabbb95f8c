// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked memory buffer with a single flush task per buffer.
//!
//! Producers call [`Memory::push`]; items accumulate in the head chunk
//! until it would exceed `max_chunk_size`, at which point the head is
//! sealed and the flush task is notified. The flush task pops the oldest
//! chunk and hands it to the [`Handler`], retrying failed chunks with
//! exponential backoff. Ordering invariants:
//!
//! - at most one `write` call is in flight per buffer
//! - chunk insertion order is preserved across successful writes
//! - a chunk is either in the queue or held by the flush task, never both

use crate::options::Options;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Anything with a byte size, so chunks can enforce their size bound.
pub trait Measured {
    fn size(&self) -> u64;
}

impl Measured for String {
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl Measured for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Errors surfaced to producers.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("item too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("buffer closed")]
    Closed,
}

/// A failed or partially-completed handler write.
///
/// `written` is the number of leading items that were durably written
/// before the failure; the flush task drops exactly those from the chunk
/// and retries the suffix.
#[derive(Debug, Error)]
#[error("write stopped after {written} items: {source}")]
pub struct WriteError {
    pub written: usize,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl WriteError {
    pub fn new(written: usize, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self { written, source: source.into() }
    }

    /// A failure before anything was written.
    pub fn fresh(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new(0, source)
    }
}

/// Chunk consumer. `Ok(())` means every item was written.
#[async_trait]
pub trait Handler<T>: Send + 'static {
    async fn write(&mut self, items: &[T]) -> Result<(), WriteError>;
}

struct Chunk<T> {
    size: u64,
    items: Vec<T>,
}

impl<T: Measured> Chunk<T> {
    fn new() -> Self {
        Self { size: 0, items: Vec::new() }
    }

    fn push(&mut self, item: T) {
        self.size += item.size();
        self.items.push(item);
    }

    /// Drop the first `n` items after a partial write.
    fn drop_written(&mut self, n: usize) {
        let n = n.min(self.items.len());
        for item in self.items.drain(..n) {
            self.size -= item.size();
        }
    }
}

struct QueueState<T> {
    /// Front is the filling head (newest), back is the oldest chunk.
    chunks: VecDeque<Chunk<T>>,
    dropped_chunks: u64,
    closed: bool,
}

struct Shared<T> {
    queue: Mutex<QueueState<T>>,
    /// Coalesced wakeup for the flush task: at most one pending permit.
    notify: Notify,
}

impl<T: Measured> Shared<T> {
    fn pop_oldest(&self) -> Option<Chunk<T>> {
        self.queue.lock().chunks.pop_back()
    }

    fn requeue_oldest(&self, chunk: Chunk<T>) {
        self.queue.lock().chunks.push_back(chunk);
    }
}

#[derive(Clone, Copy)]
struct Limits {
    flush_interval: Duration,
    retry_interval: Duration,
    max_retry_interval: Duration,
}

/// Chunked in-memory buffer. One flush task is spawned per buffer and
/// runs until [`Memory::close`].
pub struct Memory<T: Measured> {
    shared: Arc<Shared<T>>,
    max_chunk_size: u64,
    max_queue_size: usize,
    sync_mode: bool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Measured + Send + 'static> Memory<T> {
    /// Create the buffer and spawn its flush task. Must be called from a
    /// tokio runtime context.
    pub fn new<H: Handler<T>>(opts: &Options, handler: H) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                chunks: VecDeque::new(),
                dropped_chunks: 0,
                closed: false,
            }),
            notify: Notify::new(),
        });
        let limits = Limits {
            flush_interval: opts.flush_interval.as_duration(),
            retry_interval: opts.retry_interval.as_duration(),
            max_retry_interval: opts.max_retry_interval.as_duration(),
        };
        let cancel = CancellationToken::new();
        let task =
            tokio::spawn(flush_loop(Arc::clone(&shared), limits, handler, cancel.clone()));

        Self {
            shared,
            max_chunk_size: opts.max_chunk_size.bytes(),
            max_queue_size: opts.max_queue_size.bytes() as usize,
            sync_mode: limits.flush_interval.is_zero(),
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Append an item to the head chunk, sealing it first if the item
    /// would not fit. Bounded work under the queue mutex; never blocks on
    /// the handler.
    pub fn push(&self, item: T) -> Result<(), BufferError> {
        let size = item.size();
        if size > self.max_chunk_size {
            return Err(BufferError::TooLarge { size, max: self.max_chunk_size });
        }

        let mut state = self.shared.queue.lock();
        if state.closed {
            return Err(BufferError::Closed);
        }

        let seal = match state.chunks.front() {
            None => true,
            Some(head) => head.size + size > self.max_chunk_size,
        };
        if seal {
            if !state.chunks.is_empty() {
                self.shared.notify.notify_one();
            }
            state.chunks.push_front(Chunk::new());
            if state.chunks.len() > self.max_queue_size {
                state.chunks.pop_back();
                state.dropped_chunks += 1;
                let dropped = state.dropped_chunks;
                warn!(dropped, "buffer queue full; dropped oldest chunk");
            }
        }
        if let Some(head) = state.chunks.front_mut() {
            head.push(item);
        }
        drop(state);

        if self.sync_mode {
            self.shared.notify.notify_one();
        }
        Ok(())
    }

    /// Chunks currently queued (including the filling head).
    pub fn queued_chunks(&self) -> usize {
        self.shared.queue.lock().chunks.len()
    }

    /// Chunks dropped so far because the queue was full.
    pub fn dropped_chunks(&self) -> u64 {
        self.shared.queue.lock().dropped_chunks
    }

    /// Stop the flush task and synchronously attempt one final write of
    /// every remaining chunk, oldest first. Write errors during the drain
    /// are logged, not retried. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.shared.queue.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if task.await.is_err() {
                error!("buffer flush task panicked during close");
            }
        }
    }
}

fn backoff(initial: Duration, max: Duration, attempts: u32) -> Duration {
    let factor = 1u32 << attempts.min(16);
    initial.saturating_mul(factor).min(max)
}

async fn flush_loop<T, H>(
    shared: Arc<Shared<T>>,
    limits: Limits,
    mut handler: H,
    cancel: CancellationToken,
) where
    T: Measured + Send + 'static,
    H: Handler<T>,
{
    let mut tick = if limits.flush_interval.is_zero() {
        None
    } else {
        let mut iv = time::interval_at(
            time::Instant::now() + limits.flush_interval,
            limits.flush_interval,
        );
        iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(iv)
    };

    // Set when cancellation interrupts a retry; drained below.
    let mut held: Option<Chunk<T>> = None;

    'run: loop {
        let cancelled = match tick.as_mut() {
            Some(iv) => tokio::select! {
                _ = iv.tick() => false,
                _ = shared.notify.notified() => false,
                _ = cancel.cancelled() => true,
            },
            None => tokio::select! {
                _ = shared.notify.notified() => false,
                _ = cancel.cancelled() => true,
            },
        };
        if cancelled {
            break 'run;
        }

        let Some(mut chunk) = shared.pop_oldest() else {
            continue;
        };
        let mut attempts: u32 = 0;

        loop {
            match handler.write(&chunk.items).await {
                Ok(()) => {
                    attempts = 0;
                    match shared.pop_oldest() {
                        Some(next) => chunk = next,
                        None => continue 'run,
                    }
                }
                Err(err) => {
                    if err.written > 0 {
                        chunk.drop_written(err.written);
                    }
                    if chunk.items.is_empty() {
                        // The handler wrote everything it was given but
                        // still reported an error; nothing left to retry.
                        attempts = 0;
                        match shared.pop_oldest() {
                            Some(next) => chunk = next,
                            None => continue 'run,
                        }
                        continue;
                    }

                    let delay = backoff(limits.retry_interval, limits.max_retry_interval, attempts);
                    attempts = attempts.saturating_add(1);
                    warn!(
                        error = %err,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        remaining = chunk.items.len(),
                        "chunk write failed; backing off"
                    );
                    // Producer notifications must not shorten the delay;
                    // only close interrupts it.
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            held = Some(chunk);
                            break 'run;
                        }
                    }
                }
            }
        }
    }

    // Close-time drain: best-effort single attempt per chunk, oldest first.
    if let Some(chunk) = held.take() {
        shared.requeue_oldest(chunk);
    }
    while let Some(chunk) = shared.pop_oldest() {
        let len = chunk.items.len();
        if let Err(err) = handler.write(&chunk.items).await {
            error!(error = %err, items = len, "dropping chunk on close");
        } else {
            debug!(items = len, "flushed chunk on close");
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
