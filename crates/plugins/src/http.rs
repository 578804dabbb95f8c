// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! out-http: bulk indexer sink.
//!
//! Events encode to action/document line pairs; each chunk posts as one
//! newline-delimited bulk request.

use crate::stdout::format_time;
use async_trait::async_trait;
use fluxion_buffer::WriteError;
use fluxion_core::Event;
use fluxion_plugin::{Env, OutputPlugin, Payload, Plugin, PluginError};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_DEADLINE: Duration = Duration::from_secs(15);

fn default_index() -> String {
    "fluxion".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct HttpConfig {
    /// Bulk endpoint, e.g. `http://localhost:9200/_bulk`.
    uri: String,
    #[serde(default = "default_index")]
    index_name: String,
    /// Copy the event tag into this record field.
    #[serde(default)]
    tag_key: Option<String>,
}

pub struct HttpOutput {
    conf: HttpConfig,
    client: Option<reqwest::Client>,
}

impl HttpOutput {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { conf: HttpConfig::default(), client: None }
    }

    pub(crate) fn bulk_lines(&self, ev: &Event) -> Result<String, PluginError> {
        let mut doc = ev.record.clone();
        if let Some(tag_key) = &self.conf.tag_key {
            doc.insert(tag_key.clone(), serde_json::json!(ev.tag));
        }
        doc.entry("@timestamp".to_string())
            .or_insert_with(|| serde_json::json!(format_time(ev.time)));

        let action = serde_json::json!({ "index": { "_index": self.conf.index_name } });
        let doc = serde_json::to_string(&doc)
            .map_err(|err| PluginError::msg(format!("unencodable record: {err}")))?;
        Ok(format!("{action}\n{doc}\n"))
    }
}

impl Plugin for HttpOutput {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        self.conf = env.read_config()?;
        if self.conf.uri.is_empty() {
            return Err(PluginError::msg("out-http requires a uri"));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), PluginError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_DEADLINE)
            .build()
            .map_err(|err| PluginError::msg(format!("http client: {err}")))?;
        self.client = Some(client);
        Ok(())
    }
}

#[async_trait]
impl OutputPlugin for HttpOutput {
    fn encode(&self, ev: &Event) -> Result<Payload, PluginError> {
        Ok(Payload::Text(self.bulk_lines(ev)?))
    }

    async fn write(&mut self, items: &[Payload]) -> Result<(), WriteError> {
        let Some(client) = &self.client else {
            return Err(WriteError::fresh("not started"));
        };
        let mut body = Vec::new();
        for item in items {
            body.extend_from_slice(item.as_bytes());
        }

        let response = client
            .post(&self.conf.uri)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(WriteError::fresh)?;
        if !response.status().is_success() {
            return Err(WriteError::fresh(format!("bulk request failed: {}", response.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
