// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tagged, timestamped records flowing through the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Dynamic record value. Plugins attach arbitrary nested data; the core
/// never imposes a schema.
pub type Value = serde_json::Value;

/// Record payload: string keys to dynamic values, ordered for stable output.
pub type Record = BTreeMap<String, Value>;

/// Nanosecond-resolution UNIX timestamp.
///
/// Serializes as a plain integer so it stays compact on the wire and
/// comparable across languages.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventTime(i64);

impl EventTime {
    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Current wall-clock time. Clamps to zero if the clock is before the epoch.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(i64::try_from(nanos).unwrap_or(i64::MAX))
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs(self) -> i64 {
        self.0.div_euclid(1_000_000_000)
    }

    /// Fractional part below the second, in nanoseconds.
    pub fn subsec_nanos(self) -> u32 {
        self.0.rem_euclid(1_000_000_000) as u32
    }
}

/// A single pipeline event. Immutable once emitted by its producer;
/// filters build new events rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Dot-delimited routing tag, e.g. `app.access`.
    pub tag: String,
    pub time: EventTime,
    pub record: Record,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn new(tag: impl Into<String>, record: Record) -> Self {
        Self::with_time(tag, EventTime::now(), record)
    }

    pub fn with_time(tag: impl Into<String>, time: EventTime, record: Record) -> Self {
        Self { tag: tag.into(), time, record }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
