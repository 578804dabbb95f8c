// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fluxion_core::record;
use fluxion_plugin::test_support::env_with_pipe;

fn configured(config: serde_json::Value) -> RecordFilter {
    let (env, _reader) = env_with_pipe(1, "filter-record", &config);
    let mut filter = RecordFilter::new();
    filter.init(&env).unwrap();
    filter
}

#[tokio::test]
async fn renames_then_adds_then_removes() {
    let mut filter = configured(serde_json::json!({
        "rename": { "msg": "message" },
        "add": { "host": "web1" },
        "remove": ["secret"],
    }));

    let ev = Event::new("a.b", record! { "msg" => "hi", "secret" => "x" });
    let out = filter.filter(ev).unwrap().unwrap();
    assert_eq!(out.record["message"], "hi");
    assert_eq!(out.record["host"], "web1");
    assert!(!out.record.contains_key("msg"));
    assert!(!out.record.contains_key("secret"));
}

#[tokio::test]
async fn rewrites_tag_when_configured() {
    let mut filter = configured(serde_json::json!({ "tag": "routed.elsewhere" }));
    let out = filter.filter(Event::new("a.b", record! { "k" => 1 })).unwrap().unwrap();
    assert_eq!(out.tag, "routed.elsewhere");
}

#[tokio::test]
async fn empty_config_passes_events_through() {
    let mut filter = configured(serde_json::json!({}));
    let ev = Event::new("a.b", record! { "k" => 1 });
    let out = filter.filter(ev.clone()).unwrap().unwrap();
    assert_eq!(out, ev);
}

#[tokio::test]
async fn add_overwrites_existing_fields() {
    let mut filter = configured(serde_json::json!({ "add": { "k": 2 } }));
    let out = filter.filter(Event::new("a", record! { "k" => 1 })).unwrap().unwrap();
    assert_eq!(out.record["k"], 2);
}
