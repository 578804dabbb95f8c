// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line parsers shared by the input plugins.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use fluxion_core::{EventTime, Record, Value};
use fluxion_plugin::PluginError;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unparseable line: {0:?}")]
    Line(String),

    #[error("unparseable time {value:?} with format {format:?}")]
    Time { value: String, format: String },
}

/// How a raw line becomes a record.
pub enum LineFormat {
    /// Whole line under the `message` key.
    Raw,
    /// One JSON object per line.
    Json,
    /// Labeled tab-separated values: `key:value` fields joined by tabs.
    Ltsv,
    /// Named captures become record fields.
    Regexp(Regex),
}

impl LineFormat {
    /// Build from the `format` config key. `regexp` requires `pattern`.
    pub fn new(format: &str, pattern: Option<&str>) -> Result<Self, PluginError> {
        match format {
            "" | "raw" => Ok(LineFormat::Raw),
            "json" => Ok(LineFormat::Json),
            "ltsv" => Ok(LineFormat::Ltsv),
            "regexp" => {
                let pattern = pattern
                    .ok_or_else(|| PluginError::msg("format \"regexp\" requires a pattern"))?;
                let re = Regex::new(pattern)
                    .map_err(|err| PluginError::msg(format!("invalid pattern: {err}")))?;
                Ok(LineFormat::Regexp(re))
            }
            other => Err(PluginError::msg(format!("unknown format: {other:?}"))),
        }
    }

    pub fn parse(&self, line: &str) -> Result<Record, ParseError> {
        match self {
            LineFormat::Raw => {
                let mut record = Record::new();
                record.insert("message".to_string(), Value::String(line.to_string()));
                Ok(record)
            }
            LineFormat::Json => {
                serde_json::from_str(line).map_err(|_| ParseError::Line(line.to_string()))
            }
            LineFormat::Ltsv => {
                let mut record = Record::new();
                for field in line.split('\t') {
                    let (key, value) = field
                        .split_once(':')
                        .ok_or_else(|| ParseError::Line(line.to_string()))?;
                    record.insert(key.to_string(), Value::String(value.to_string()));
                }
                Ok(record)
            }
            LineFormat::Regexp(re) => {
                let caps = re.captures(line).ok_or_else(|| ParseError::Line(line.to_string()))?;
                let mut record = Record::new();
                for name in re.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        record.insert(name.to_string(), Value::String(m.as_str().to_string()));
                    }
                }
                Ok(record)
            }
        }
    }
}

/// Promotes a record field to the event timestamp.
pub struct TimeParser {
    key: String,
    format: String,
    offset: Option<FixedOffset>,
}

impl TimeParser {
    /// `timezone` is a fixed offset like `+09:00`; timestamps carrying
    /// their own zone (formats with `%z`) ignore it.
    pub fn new(key: &str, format: &str, timezone: Option<&str>) -> Result<Self, PluginError> {
        let offset = match timezone {
            Some(tz) => Some(
                tz.parse::<FixedOffset>()
                    .map_err(|err| PluginError::msg(format!("invalid timezone {tz:?}: {err}")))?,
            ),
            None => None,
        };
        Ok(Self { key: key.to_string(), format: format.to_string(), offset })
    }

    /// Parse the time field out of `record`, if present.
    pub fn extract(&self, record: &Record) -> Result<Option<EventTime>, ParseError> {
        let Some(value) = record.get(&self.key).and_then(Value::as_str) else {
            return Ok(None);
        };
        let nanos = self.parse_str(value).ok_or_else(|| ParseError::Time {
            value: value.to_string(),
            format: self.format.clone(),
        })?;
        Ok(Some(EventTime::from_nanos(nanos)))
    }

    fn parse_str(&self, value: &str) -> Option<i64> {
        if let Ok(dt) = DateTime::parse_from_str(value, &self.format) {
            return dt.timestamp_nanos_opt();
        }
        let naive = NaiveDateTime::parse_from_str(value, &self.format).ok()?;
        match self.offset {
            Some(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .and_then(|dt| dt.timestamp_nanos_opt()),
            None => Utc.from_utc_datetime(&naive).timestamp_nanos_opt(),
        }
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
