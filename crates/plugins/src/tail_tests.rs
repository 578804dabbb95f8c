// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fluxion_plugin::test_support::env_with_pipe;
use fluxion_wire::{MessageBody, PipeReader};
use std::io::Write;
use tokio::time::timeout;

async fn next_event(reader: &mut PipeReader) -> Event {
    let msg = timeout(Duration::from_secs(5), reader.read()).await.unwrap().unwrap();
    match msg.body {
        MessageBody::Event(ev) => ev,
        other => panic!("expected Event, got {other:?}"),
    }
}

fn start_tail(config: serde_json::Value) -> (TailInput, PipeReader) {
    let (env, reader) = env_with_pipe(1, "in-tail", &config);
    let mut plugin = TailInput::new();
    plugin.init(&env).unwrap();
    plugin.start().unwrap();
    (plugin, reader)
}

#[tokio::test]
async fn reads_existing_lines_from_head() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "first\nsecond\n").unwrap();

    let (mut plugin, mut reader) = start_tail(serde_json::json!({
        "tag": "tail.test",
        "path": path.to_string_lossy(),
        "read_from_head": true,
    }));

    let ev = next_event(&mut reader).await;
    assert_eq!(ev.tag, "tail.test");
    assert_eq!(ev.record["message"], "first");
    let ev = next_event(&mut reader).await;
    assert_eq!(ev.record["message"], "second");

    plugin.stop().unwrap();
}

#[tokio::test]
async fn picks_up_appended_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "old\n").unwrap();

    // Default start position is the end of file: "old" is skipped.
    let (mut plugin, mut reader) = start_tail(serde_json::json!({
        "tag": "tail.test",
        "path": path.to_string_lossy(),
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "appended").unwrap();
    drop(file);

    let ev = next_event(&mut reader).await;
    assert_eq!(ev.record["message"], "appended");

    plugin.stop().unwrap();
}

#[tokio::test]
async fn parses_lines_with_configured_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "status:200\thost:a\n").unwrap();

    let (mut plugin, mut reader) = start_tail(serde_json::json!({
        "tag": "tail.ltsv",
        "path": path.to_string_lossy(),
        "format": "ltsv",
        "read_from_head": true,
    }));

    let ev = next_event(&mut reader).await;
    assert_eq!(ev.record["status"], "200");
    assert_eq!(ev.record["host"], "a");

    plugin.stop().unwrap();
}

#[tokio::test]
async fn promotes_time_key_to_event_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "{\"time\": \"2026-03-01 12:00:00\", \"n\": 1}\n").unwrap();

    let (mut plugin, mut reader) = start_tail(serde_json::json!({
        "tag": "tail.timed",
        "path": path.to_string_lossy(),
        "format": "json",
        "time_key": "time",
        "time_format": "%Y-%m-%d %H:%M:%S",
        "read_from_head": true,
    }));

    let ev = next_event(&mut reader).await;
    assert_eq!(ev.time.as_secs(), 1_772_366_400);
    assert_eq!(ev.record["n"], 1);

    plugin.stop().unwrap();
}

#[tokio::test]
async fn pos_file_records_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let pos = dir.path().join("app.pos");
    std::fs::write(&path, "one\ntwo\n").unwrap();

    let (mut plugin, mut reader) = start_tail(serde_json::json!({
        "tag": "tail.pos",
        "path": path.to_string_lossy(),
        "pos_file": pos.to_string_lossy(),
        "read_from_head": true,
    }));

    next_event(&mut reader).await;
    next_event(&mut reader).await;

    // The pos file catches up to the end of file at the next EOF.
    timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(content) = std::fs::read_to_string(&pos) {
                if content.trim() == "8" {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    plugin.stop().unwrap();
}

#[tokio::test]
async fn resumes_from_saved_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let pos = dir.path().join("app.pos");
    std::fs::write(&path, "one\ntwo\n").unwrap();
    std::fs::write(&pos, "4").unwrap(); // past "one\n"

    let (mut plugin, mut reader) = start_tail(serde_json::json!({
        "tag": "tail.resume",
        "path": path.to_string_lossy(),
        "pos_file": pos.to_string_lossy(),
        "read_from_head": true,
    }));

    let ev = next_event(&mut reader).await;
    assert_eq!(ev.record["message"], "two");

    plugin.stop().unwrap();
}

#[tokio::test]
async fn missing_config_keys_fail_init() {
    let (env, _reader) = env_with_pipe(1, "in-tail", &serde_json::json!({ "tag": "t" }));
    assert!(TailInput::new().init(&env).is_err());
}
