// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tests over embedded plugins: everything runs in-process, but
//! the full protocol (handshake, configure/start, buffers, filter
//! chaining) is exercised end to end.

use super::*;
use async_trait::async_trait;
use fluxion_buffer::{HumanDuration, WriteError};
use fluxion_core::EventTime;
use fluxion_plugin::{
    factory, Env, FilterPlugin, OutputPlugin, Payload, Plugin, PluginError, PluginSpec,
};
use serde::Deserialize;
use std::sync::Mutex as SyncMutex;
use tokio::time::{sleep, timeout};

type Sink = Arc<SyncMutex<Vec<(String, serde_json::Value)>>>;

// --- collecting output plugin ---

#[derive(Deserialize)]
struct CollectConfig {
    #[serde(default)]
    mark: String,
}

struct CollectOut {
    sink: Sink,
    mark: String,
}

impl Plugin for CollectOut {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        let conf: CollectConfig = env.read_config()?;
        self.mark = conf.mark;
        Ok(())
    }
}

#[async_trait]
impl OutputPlugin for CollectOut {
    fn encode(&self, ev: &Event) -> Result<Payload, PluginError> {
        let doc = serde_json::json!({ "mark": self.mark, "tag": ev.tag, "record": ev.record });
        Ok(Payload::Text(doc.to_string()))
    }

    async fn write(&mut self, items: &[Payload]) -> Result<(), WriteError> {
        let mut sink = self.sink.lock().map_err(|_| WriteError::fresh("poisoned"))?;
        for item in items {
            let doc: serde_json::Value =
                serde_json::from_slice(item.as_bytes()).map_err(WriteError::fresh)?;
            let tag = doc["tag"].as_str().unwrap_or_default().to_string();
            sink.push((tag, doc));
        }
        Ok(())
    }
}

fn collect_registry(sink: &Sink) -> Registry {
    let mut registry = Registry::new();
    let sink = Arc::clone(sink);
    registry.register(
        "out-collect",
        factory(move || {
            PluginSpec::Output(Box::new(CollectOut {
                sink: Arc::clone(&sink),
                mark: String::new(),
            }))
        }),
    );
    registry
}

// --- marking filter plugin ---

#[derive(Deserialize)]
struct MarkConfig {
    mark: String,
}

struct MarkFilter {
    mark: String,
}

impl Plugin for MarkFilter {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        let conf: MarkConfig = env.read_config()?;
        self.mark = conf.mark;
        Ok(())
    }
}

impl FilterPlugin for MarkFilter {
    fn filter(&mut self, ev: Event) -> Result<Option<Event>, PluginError> {
        let mut out = ev;
        let path = out
            .record
            .entry("path".to_string())
            .or_insert_with(|| serde_json::json!([]));
        if let Some(items) = path.as_array_mut() {
            items.push(serde_json::json!(self.mark));
        }
        Ok(Some(out))
    }
}

fn register_mark_filter(registry: &mut Registry) {
    registry.register(
        "filter-mark",
        factory(|| PluginSpec::Filter(Box::new(MarkFilter { mark: String::new() }))),
    );
}

// --- helpers ---

fn mark_config(mark: &str) -> Vec<u8> {
    rmp_serde::to_vec_named(&serde_json::json!({ "mark": mark })).unwrap()
}

fn sync_buffer() -> Options {
    Options {
        name: "sync".to_string(),
        flush_interval: HumanDuration::from_millis(0),
        ..Options::default()
    }
}

fn ev(tag: &str) -> Event {
    Event::with_time(tag, EventTime::from_secs(1), record! { "message" => "x" })
}

async fn wait_for(sink: &Sink, n: usize) -> Vec<(String, serde_json::Value)> {
    timeout(Duration::from_secs(5), async {
        loop {
            {
                let sink = sink.lock().unwrap();
                if sink.len() >= n {
                    return sink.clone();
                }
            }
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("sink never reached {n} events"))
}

#[tokio::test(start_paused = true)]
async fn event_reaches_matching_output() {
    let sink: Sink = Arc::new(SyncMutex::new(Vec::new()));
    let engine = Engine::new(collect_registry(&sink));
    engine.register_buffer(sync_buffer());
    engine
        .add_output("", "collect", "app.**", Some("sync"), mark_config("a"))
        .unwrap();
    engine.start().unwrap();

    engine.filter(ev("app.access"));
    engine.filter(ev("db.query")); // no match; dropped

    let got = wait_for(&sink, 1).await;
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0, "app.access");

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn first_match_wins_within_a_group() {
    let sink: Sink = Arc::new(SyncMutex::new(Vec::new()));
    let engine = Engine::new(collect_registry(&sink));
    engine.register_buffer(sync_buffer());
    // Same group: "a.**" shadows the later, more specific "a.b".
    engine.add_output("", "collect", "a.**", Some("sync"), mark_config("broad")).unwrap();
    engine.add_output("", "collect", "a.b", Some("sync"), mark_config("narrow")).unwrap();
    engine.start().unwrap();

    engine.filter(ev("a.b"));

    let got = wait_for(&sink, 1).await;
    assert_eq!(got[0].1["mark"], "broad");

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn named_groups_fan_out_in_insertion_order() {
    let sink: Sink = Arc::new(SyncMutex::new(Vec::new()));
    let engine = Engine::new(collect_registry(&sink));
    engine.register_buffer(sync_buffer());
    engine.add_output("", "collect", "a.**", Some("sync"), mark_config("default")).unwrap();
    engine
        .add_output("secondary", "collect", "a.b", Some("sync"), mark_config("secondary"))
        .unwrap();
    engine.start().unwrap();

    // Matches both groups: delivered to each.
    engine.filter(ev("a.b"));
    let got = wait_for(&sink, 2).await;
    let marks: Vec<_> = got.iter().map(|(_, doc)| doc["mark"].clone()).collect();
    assert!(marks.contains(&serde_json::json!("default")));
    assert!(marks.contains(&serde_json::json!("secondary")));

    // Matches only the default group.
    sink.lock().unwrap().clear();
    engine.filter(ev("a.c"));
    let got = wait_for(&sink, 1).await;
    assert_eq!(got[0].1["mark"], "default");

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn filter_chain_applies_stages_in_order() {
    let sink: Sink = Arc::new(SyncMutex::new(Vec::new()));
    let mut registry = collect_registry(&sink);
    register_mark_filter(&mut registry);

    let engine = Engine::new(registry);
    engine.register_buffer(sync_buffer());
    engine.add_filter("mark", "a.*", mark_config("f1")).unwrap();
    engine.add_filter("mark", "a.b", mark_config("f2")).unwrap();
    engine.add_output("", "collect", "**", Some("sync"), mark_config("out")).unwrap();
    engine.start().unwrap();

    // a.b traverses both stages, a.c only the first.
    engine.filter(ev("a.b"));
    engine.filter(ev("a.c"));

    let got = wait_for(&sink, 2).await;
    let path_of = |tag: &str| {
        got.iter()
            .find(|(t, _)| t == tag)
            .map(|(_, doc)| doc["record"]["path"].clone())
            .unwrap_or_else(|| panic!("no event for {tag}"))
    };
    assert_eq!(path_of("a.b"), serde_json::json!(["f1", "f2"]));
    assert_eq!(path_of("a.c"), serde_json::json!(["f1"]));

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_buffer_rejected_at_registration() {
    let sink: Sink = Arc::new(SyncMutex::new(Vec::new()));
    let engine = Engine::new(collect_registry(&sink));
    let err = engine
        .add_output("", "collect", "**", Some("missing"), mark_config(""))
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownBuffer(name) if name == "missing"));
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_rejected() {
    let sink: Sink = Arc::new(SyncMutex::new(Vec::new()));
    let engine = Engine::new(collect_registry(&sink));
    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_drains_buffered_output() {
    let sink: Sink = Arc::new(SyncMutex::new(Vec::new()));
    let engine = Engine::new(collect_registry(&sink));
    // Long flush interval: nothing reaches the sink until shutdown drain.
    engine.register_buffer(Options {
        name: "slow".to_string(),
        flush_interval: HumanDuration::from_secs(3600),
        ..Options::default()
    });
    engine.add_output("", "collect", "**", Some("slow"), mark_config("d")).unwrap();
    engine.start().unwrap();

    engine.filter(ev("a.b"));
    sleep(Duration::from_millis(20)).await;
    assert!(sink.lock().unwrap().is_empty());

    engine.stop().await;
    let got = sink.lock().unwrap().clone();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0, "a.b");
}
