// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! filter-record: declarative record surgery.
//!
//! Renames fields, adds fixed fields, removes fields, and optionally
//! rewrites the tag, in that order.

use fluxion_core::{Event, Value};
use fluxion_plugin::{Env, FilterPlugin, Plugin, PluginError};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecordConfig {
    /// `old_name -> new_name`
    rename: BTreeMap<String, String>,
    /// Fields inserted (or overwritten) on every event.
    add: BTreeMap<String, Value>,
    remove: Vec<String>,
    /// Rewrite the event tag.
    tag: Option<String>,
}

pub struct RecordFilter {
    conf: RecordConfig,
}

impl RecordFilter {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { conf: RecordConfig::default() }
    }
}

impl Plugin for RecordFilter {
    fn init(&mut self, env: &Env) -> Result<(), PluginError> {
        self.conf = env.read_config()?;
        Ok(())
    }
}

impl FilterPlugin for RecordFilter {
    fn filter(&mut self, ev: Event) -> Result<Option<Event>, PluginError> {
        let mut out = ev;
        for (old, new) in &self.conf.rename {
            if let Some(value) = out.record.remove(old) {
                out.record.insert(new.clone(), value);
            }
        }
        for (key, value) in &self.conf.add {
            out.record.insert(key.clone(), value.clone());
        }
        for key in &self.conf.remove {
            out.record.remove(key);
        }
        if let Some(tag) = &self.conf.tag {
            out.tag = tag.clone();
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
