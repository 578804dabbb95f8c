// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::options::{HumanDuration, HumanSize};
use std::collections::VecDeque;
use tokio::time::{sleep, Duration, Instant};

/// Scripted handler: records every attempt, pops one outcome per call
/// (default Ok), and remembers which items each attempt saw.
#[derive(Clone)]
struct RecordingHandler {
    log: Arc<Mutex<Log>>,
}

#[derive(Default)]
struct Log {
    /// Items seen by each write call, in call order.
    attempts: Vec<Vec<String>>,
    attempt_times: Vec<Instant>,
    /// Items acknowledged as written (full batches and partial prefixes).
    written: Vec<String>,
    outcomes: VecDeque<Outcome>,
}

#[derive(Clone, Copy)]
enum Outcome {
    Ok,
    Fail,
    Partial(usize),
}

impl RecordingHandler {
    fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            log: Arc::new(Mutex::new(Log {
                outcomes: outcomes.into_iter().collect(),
                ..Log::default()
            })),
        }
    }

    fn attempts(&self) -> Vec<Vec<String>> {
        self.log.lock().attempts.clone()
    }

    fn attempt_gaps_ms(&self) -> Vec<u128> {
        let times = self.log.lock().attempt_times.clone();
        times.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect()
    }

    fn written(&self) -> Vec<String> {
        self.log.lock().written.clone()
    }
}

#[async_trait]
impl Handler<String> for RecordingHandler {
    async fn write(&mut self, items: &[String]) -> Result<(), WriteError> {
        let mut log = self.log.lock();
        log.attempts.push(items.to_vec());
        log.attempt_times.push(Instant::now());
        match log.outcomes.pop_front().unwrap_or(Outcome::Ok) {
            Outcome::Ok => {
                log.written.extend(items.iter().cloned());
                Ok(())
            }
            Outcome::Fail => Err(WriteError::fresh("scripted failure")),
            Outcome::Partial(n) => {
                log.written.extend(items[..n].iter().cloned());
                Err(WriteError::new(n, "scripted partial"))
            }
        }
    }
}

fn opts(chunk: u64, queue: u64, flush: HumanDuration) -> Options {
    Options {
        max_chunk_size: HumanSize(chunk),
        max_queue_size: HumanSize(queue),
        flush_interval: flush,
        retry_interval: HumanDuration::from_millis(10),
        max_retry_interval: HumanDuration::from_secs(1),
        ..Options::default()
    }
}

/// An item of exactly `size` bytes, labeled by `n`.
fn item(n: usize, size: usize) -> String {
    format!("{n:0>size$}")
}

#[tokio::test(start_paused = true)]
async fn chunks_split_at_size_boundary() {
    let handler = RecordingHandler::new([]);
    let buf = Memory::new(&opts(300, 64, HumanDuration::from_secs(3600)), handler.clone());

    for n in 0..10 {
        buf.push(item(n, 100)).unwrap();
    }
    sleep(Duration::from_millis(1)).await;
    buf.close().await;

    let sizes: Vec<usize> = handler.attempts().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 3, 1]);

    let expected: Vec<String> = (0..10).map(|n| item(n, 100)).collect();
    assert_eq!(handler.written(), expected);
}

#[tokio::test(start_paused = true)]
async fn oversized_item_rejected() {
    let handler = RecordingHandler::new([]);
    let buf = Memory::new(&opts(100, 64, HumanDuration::from_secs(3600)), handler);

    match buf.push(item(0, 101)) {
        Err(BufferError::TooLarge { size: 101, max: 100 }) => {}
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn retry_backoff_doubles() {
    let handler =
        RecordingHandler::new([Outcome::Fail, Outcome::Fail, Outcome::Fail, Outcome::Ok]);
    let buf = Memory::new(&opts(1000, 64, HumanDuration::from_millis(0)), handler.clone());

    buf.push("a".to_string()).unwrap();
    sleep(Duration::from_millis(200)).await;

    assert_eq!(handler.attempt_gaps_ms(), vec![10, 20, 40]);
    assert_eq!(handler.written(), vec!["a".to_string()]);
    buf.close().await;
}

#[tokio::test(start_paused = true)]
async fn retry_backoff_clamps_at_max() {
    let handler = RecordingHandler::new(
        [Outcome::Fail, Outcome::Fail, Outcome::Fail, Outcome::Fail, Outcome::Ok],
    );
    let mut options = opts(1000, 64, HumanDuration::from_millis(0));
    options.max_retry_interval = HumanDuration::from_millis(25);
    let buf = Memory::new(&options, handler.clone());

    buf.push("a".to_string()).unwrap();
    sleep(Duration::from_millis(200)).await;

    assert_eq!(handler.attempt_gaps_ms(), vec![10, 20, 25, 25]);
    buf.close().await;
}

#[tokio::test(start_paused = true)]
async fn partial_write_retries_suffix_in_order() {
    let handler = RecordingHandler::new([Outcome::Partial(1), Outcome::Ok]);
    let buf = Memory::new(&opts(1000, 64, HumanDuration::from_millis(0)), handler.clone());

    buf.push("a".to_string()).unwrap();
    buf.push("b".to_string()).unwrap();
    buf.push("c".to_string()).unwrap();
    sleep(Duration::from_millis(50)).await;

    let attempts = handler.attempts();
    assert_eq!(attempts[0], vec!["a", "b", "c"]);
    assert_eq!(attempts[1], vec!["b", "c"]);
    assert_eq!(handler.written(), vec!["a", "b", "c"]);
    buf.close().await;
}

#[tokio::test(start_paused = true)]
async fn fifo_preserved_under_success() {
    let handler = RecordingHandler::new([]);
    let buf = Memory::new(&opts(250, 64, HumanDuration::from_millis(0)), handler.clone());

    for n in 0..20 {
        buf.push(item(n, 100)).unwrap();
        if n % 3 == 0 {
            sleep(Duration::from_millis(1)).await;
        }
    }
    sleep(Duration::from_millis(5)).await;
    buf.close().await;

    let expected: Vec<String> = (0..20).map(|n| item(n, 100)).collect();
    assert_eq!(handler.written(), expected);
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_oldest_chunk() {
    // First write fails and parks the flush task in a long backoff, so
    // chunks pile up behind it.
    let handler = RecordingHandler::new([Outcome::Fail]);
    let mut options = opts(100, 2, HumanDuration::from_secs(3600));
    options.retry_interval = HumanDuration::from_secs(3600);
    let buf = Memory::new(&options, handler.clone());

    buf.push(item(0, 100)).unwrap();
    buf.push(item(1, 100)).unwrap();
    sleep(Duration::from_millis(1)).await; // flush picks up chunk 0, fails, parks
    buf.push(item(2, 100)).unwrap();
    buf.push(item(3, 100)).unwrap(); // queue would be [3, 2, 1]; 1 is dropped

    assert_eq!(buf.dropped_chunks(), 1);
    assert_eq!(buf.queued_chunks(), 2);

    buf.close().await;
    // Close drains the parked chunk first, then the two newest.
    assert_eq!(handler.written(), vec![item(0, 100), item(2, 100), item(3, 100)]);
}

#[tokio::test(start_paused = true)]
async fn queue_length_never_exceeds_cap() {
    let handler = RecordingHandler::new(std::iter::repeat_n(Outcome::Fail, 100));
    let mut options = opts(100, 3, HumanDuration::from_secs(3600));
    options.retry_interval = HumanDuration::from_secs(3600);
    let buf = Memory::new(&options, handler);

    for n in 0..50 {
        buf.push(item(n, 40)).unwrap();
        assert!(buf.queued_chunks() <= 3, "queue overflowed at push {n}");
    }
}

#[tokio::test(start_paused = true)]
async fn close_flushes_remaining_chunks() {
    let handler = RecordingHandler::new([]);
    let buf = Memory::new(&opts(1000, 64, HumanDuration::from_secs(3600)), handler.clone());

    buf.push("a".to_string()).unwrap();
    buf.push("b".to_string()).unwrap();
    buf.close().await;

    assert_eq!(handler.attempts(), vec![vec!["a".to_string(), "b".to_string()]]);
    assert!(matches!(buf.push("c".to_string()), Err(BufferError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn close_logs_but_does_not_retry_drain_failures() {
    let handler = RecordingHandler::new([Outcome::Fail]);
    let buf = Memory::new(&opts(1000, 64, HumanDuration::from_secs(3600)), handler.clone());

    buf.push("a".to_string()).unwrap();
    buf.close().await;

    // One attempt only; the chunk is dropped, not retried.
    assert_eq!(handler.attempts().len(), 1);
    assert!(handler.written().is_empty());
}
