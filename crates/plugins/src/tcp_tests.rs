// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fluxion_plugin::test_support::env_with_pipe;
use fluxion_wire::{MessageBody, PipeReader};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

async fn next_event(reader: &mut PipeReader) -> Event {
    let msg = timeout(Duration::from_secs(5), reader.read()).await.unwrap().unwrap();
    match msg.body {
        MessageBody::Event(ev) => ev,
        other => panic!("expected Event, got {other:?}"),
    }
}

fn start_tcp(config: serde_json::Value) -> (TcpInput, PipeReader) {
    let (env, reader) = env_with_pipe(1, "in-tcp", &config);
    let mut plugin = TcpInput::new();
    plugin.init(&env).unwrap();
    plugin.start().unwrap();
    (plugin, reader)
}

#[tokio::test]
async fn lines_become_tagged_events() {
    let (mut plugin, mut reader) = start_tcp(serde_json::json!({
        "bind": "127.0.0.1:0",
        "tag": "tcp.test",
    }));
    let addr = plugin.local_addr().unwrap();

    let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
    conn.write_all(b"hello\nworld\n").await.unwrap();

    let ev = next_event(&mut reader).await;
    assert_eq!(ev.tag, "tcp.test");
    assert_eq!(ev.record["message"], "hello");
    let ev = next_event(&mut reader).await;
    assert_eq!(ev.record["message"], "world");

    plugin.stop().unwrap();
}

#[tokio::test]
async fn connections_are_served_concurrently() {
    let (mut plugin, mut reader) = start_tcp(serde_json::json!({
        "bind": "127.0.0.1:0",
        "tag": "tcp.multi",
        "format": "json",
    }));
    let addr = plugin.local_addr().unwrap();

    let mut a = tokio::net::TcpStream::connect(addr).await.unwrap();
    let mut b = tokio::net::TcpStream::connect(addr).await.unwrap();
    a.write_all(b"{\"from\": \"a\"}\n").await.unwrap();
    b.write_all(b"{\"from\": \"b\"}\n").await.unwrap();

    let mut seen = vec![
        next_event(&mut reader).await.record["from"].clone(),
        next_event(&mut reader).await.record["from"].clone(),
    ];
    seen.sort_by_key(|v| v.as_str().map(str::to_string));
    assert_eq!(seen, vec![serde_json::json!("a"), serde_json::json!("b")]);

    plugin.stop().unwrap();
}

#[tokio::test]
async fn bad_bind_address_fails_start() {
    let (env, _reader) = env_with_pipe(
        1,
        "in-tcp",
        &serde_json::json!({ "bind": "256.0.0.1:1", "tag": "t" }),
    );
    let mut plugin = TcpInput::new();
    plugin.init(&env).unwrap();
    assert!(plugin.start().is_err());
}

#[tokio::test]
async fn unparseable_lines_are_logged_not_fatal() {
    let (mut plugin, mut reader) = start_tcp(serde_json::json!({
        "bind": "127.0.0.1:0",
        "tag": "tcp.json",
        "format": "json",
    }));
    let addr = plugin.local_addr().unwrap();

    let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
    conn.write_all(b"not json\n{\"ok\": 1}\n").await.unwrap();

    // First a warning on the log tag space, then the good event.
    let warning = next_event(&mut reader).await;
    assert_eq!(warning.tag, "fluxion.log.warning");
    let ev = next_event(&mut reader).await;
    assert_eq!(ev.record["ok"], 1);

    plugin.stop().unwrap();
}
