// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffer tuning options with human-friendly size and duration parsing.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Parse failures for human sizes and durations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid size: {0:?}")]
    Size(String),
    #[error("invalid duration: {0:?}")]
    Duration(String),
}

/// Byte count accepting `K`/`M`/`G`/`T` suffixes. Base 1000 by default;
/// a trailing `i` selects base 1024 (`8Mi` = 8 × 1024²).
///
/// Serializes as a plain integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HumanSize(pub u64);

impl HumanSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl From<u64> for HumanSize {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl FromStr for HumanSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseError::Size(s.to_string());

        let mut rest = s;
        let mut base: u64 = 1000;
        if let Some(stripped) = rest.strip_suffix('i') {
            base = 1024;
            rest = stripped;
        }

        let mut multiplier: u64 = 1;
        if let Some(last) = rest.chars().last() {
            let exp = match last.to_ascii_uppercase() {
                'K' => 1,
                'M' => 2,
                'G' => 3,
                'T' => 4,
                _ => 0,
            };
            if exp > 0 {
                multiplier = base.pow(exp);
                rest = &rest[..rest.len() - last.len_utf8()];
            }
        }

        let n: u64 = rest.trim().parse().map_err(|_| invalid())?;
        n.checked_mul(multiplier).map(HumanSize).ok_or_else(invalid)
    }
}

impl Serialize for HumanSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for HumanSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeVisitor;

        impl Visitor<'_> for SizeVisitor {
            type Value = HumanSize;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a byte count or size string like \"8M\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<HumanSize, E> {
                Ok(HumanSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<HumanSize, E> {
                u64::try_from(v)
                    .map(HumanSize)
                    .map_err(|_| E::custom("negative size"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<HumanSize, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}

/// Duration accepting `ms`/`s`/`m`/`h`/`d` suffixes; a bare number is
/// seconds and the empty string is zero.
///
/// Serializes as integer milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }
}

impl From<Duration> for HumanDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self(Duration::ZERO));
        }

        let (num_str, suffix) = s
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| (&s[..i], &s[i..]))
            .unwrap_or((s, ""));

        let num: u64 = num_str
            .parse()
            .map_err(|_| ParseError::Duration(s.to_string()))?;

        let duration = match suffix.trim() {
            "ms" => Duration::from_millis(num),
            "" | "s" => Duration::from_secs(num),
            "m" => Duration::from_secs(num * 60),
            "h" => Duration::from_secs(num * 3600),
            "d" => Duration::from_secs(num * 86400),
            _ => return Err(ParseError::Duration(s.to_string())),
        };
        Ok(Self(duration))
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0.as_millis() as u64)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("milliseconds or a duration string like \"15s\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<HumanDuration, E> {
                Ok(HumanDuration(Duration::from_millis(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<HumanDuration, E> {
                u64::try_from(v)
                    .map(|ms| HumanDuration(Duration::from_millis(ms)))
                    .map_err(|_| E::custom("negative duration"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<HumanDuration, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

/// Buffer profile. Named profiles come from configuration; every output
/// exec unit resolves one by name (`default` unless overridden).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub name: String,
    pub max_chunk_size: HumanSize,
    pub max_queue_size: HumanSize,
    pub flush_interval: HumanDuration,
    pub retry_interval: HumanDuration,
    pub max_retry_interval: HumanDuration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_chunk_size: HumanSize(8 * 1024 * 1024),
            max_queue_size: HumanSize(64),
            flush_interval: HumanDuration::from_secs(15),
            retry_interval: HumanDuration::from_millis(500),
            max_retry_interval: HumanDuration::from_secs(60),
        }
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
