// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML configuration for `fluxiond`.
//!
//! Top-level tables: `[[buffer]]`, `[[input]]`, `[[filter]]`,
//! `[[output]]`, plus named output groups as `[["output:NAME"]]` and an
//! optional `[engine]` table. Plugin-specific keys are kept opaque: each
//! table is re-encoded as MessagePack and handed to the plugin's own
//! config structure through `Configure`.

use fluxion_buffer::Options;
use fluxion_engine::{Engine, EngineError, RestartPolicy};
use fluxion_plugin::Registry;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unencodable plugin config: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// One `[[input]]` / `[[filter]]` / `[[output]]` block.
#[derive(Debug, Clone)]
pub struct PluginConf {
    pub plugin_type: String,
    /// Tag pattern; absent only on inputs.
    pub pattern: Option<String>,
    /// Named buffer profile; outputs only.
    pub buffer_name: Option<String>,
    /// The whole table, MessagePack-encoded, for the plugin itself.
    pub params: Vec<u8>,
}

/// Parsed daemon configuration.
#[derive(Debug, Default)]
pub struct Config {
    pub buffers: Vec<Options>,
    pub inputs: Vec<PluginConf>,
    pub filters: Vec<PluginConf>,
    /// `(group name, outputs)`; the default group is the empty string.
    pub output_groups: Vec<(String, Vec<PluginConf>)>,
    pub restart_policy: RestartPolicy,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = content.parse()?;
        let mut config = Config::default();

        for (key, value) in &table {
            match key.as_str() {
                "buffer" => {
                    for entry in as_table_array(key, value)? {
                        let opts: Options = toml::Value::Table(entry.clone()).try_into()?;
                        if opts.name.is_empty() {
                            return Err(ConfigError::Invalid("buffer with empty name".into()));
                        }
                        config.buffers.push(opts);
                    }
                }
                "input" => {
                    for entry in as_table_array(key, value)? {
                        config.inputs.push(plugin_conf(key, entry, false)?);
                    }
                }
                "filter" => {
                    for entry in as_table_array(key, value)? {
                        config.filters.push(plugin_conf(key, entry, true)?);
                    }
                }
                "engine" => {
                    let entry = value.as_table().ok_or_else(|| {
                        ConfigError::Invalid("engine must be a table".into())
                    })?;
                    config.restart_policy = restart_policy(entry)?;
                }
                _ => {
                    // `output` or `output:NAME`.
                    let Some(group) = output_group(key) else {
                        return Err(ConfigError::Invalid(format!("unknown section {key:?}")));
                    };
                    let mut outputs = Vec::new();
                    for entry in as_table_array(key, value)? {
                        outputs.push(plugin_conf(key, entry, true)?);
                    }
                    config.output_groups.push((group.to_string(), outputs));
                }
            }
        }
        Ok(config)
    }
}

fn output_group(key: &str) -> Option<&str> {
    if key == "output" {
        return Some("");
    }
    key.strip_prefix("output:")
}

fn as_table_array<'a>(
    key: &str,
    value: &'a toml::Value,
) -> Result<impl Iterator<Item = &'a toml::Table>, ConfigError> {
    let entries = value
        .as_array()
        .ok_or_else(|| ConfigError::Invalid(format!("{key} must be an array of tables")))?;
    let mut tables = Vec::with_capacity(entries.len());
    for entry in entries {
        tables.push(entry.as_table().ok_or_else(|| {
            ConfigError::Invalid(format!("{key} entries must be tables"))
        })?);
    }
    Ok(tables.into_iter())
}

fn plugin_conf(
    section: &str,
    entry: &toml::Table,
    needs_match: bool,
) -> Result<PluginConf, ConfigError> {
    let plugin_type = entry
        .get("type")
        .and_then(toml::Value::as_str)
        .ok_or_else(|| ConfigError::Invalid(format!("{section} entry without a type")))?
        .to_string();

    let pattern = entry.get("match").and_then(toml::Value::as_str).map(str::to_string);
    if needs_match && pattern.is_none() {
        return Err(ConfigError::Invalid(format!(
            "{section} entry of type {plugin_type:?} without a match pattern"
        )));
    }

    let buffer_name =
        entry.get("buffer_name").and_then(toml::Value::as_str).map(str::to_string);

    Ok(PluginConf {
        plugin_type,
        pattern,
        buffer_name,
        params: rmp_serde::to_vec_named(entry)?,
    })
}

fn restart_policy(entry: &toml::Table) -> Result<RestartPolicy, ConfigError> {
    match entry.get("restart_policy").and_then(toml::Value::as_str) {
        None => Ok(RestartPolicy::default()),
        Some("always") => Ok(RestartPolicy::Always),
        Some("on-error") => Ok(RestartPolicy::OnError),
        Some("never") => Ok(RestartPolicy::Never),
        Some(other) => {
            Err(ConfigError::Invalid(format!("unknown restart_policy {other:?}")))
        }
    }
}

/// Wire a parsed configuration into a ready-to-start engine.
pub fn build_engine(config: &Config, registry: Registry) -> Result<Engine, ConfigError> {
    let engine = Engine::with_restart_policy(registry, config.restart_policy);
    for opts in &config.buffers {
        engine.register_buffer(opts.clone());
    }
    for input in &config.inputs {
        engine.add_input(&input.plugin_type, input.params.clone())?;
    }
    for filter in &config.filters {
        let pattern = filter
            .pattern
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("filter without match".into()))?;
        engine.add_filter(&filter.plugin_type, pattern, filter.params.clone())?;
    }
    for (group, outputs) in &config.output_groups {
        for output in outputs {
            let pattern = output
                .pattern
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("output without match".into()))?;
            engine.add_output(
                group,
                &output.plugin_type,
                pattern,
                output.buffer_name.as_deref(),
                output.params.clone(),
            )?;
        }
    }
    Ok(engine)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
