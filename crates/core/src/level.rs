// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log levels for the reserved `fluxion.log.<level>` tag namespace.

use serde::{Deserialize, Serialize};

/// Tag prefix under which engine- and plugin-emitted log events travel.
pub const LOG_TAG_PREFIX: &str = "fluxion.log";

/// Severity of a pipeline-visible log event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full tag for a log event at the given level, e.g. `fluxion.log.warning`.
pub fn log_tag(level: LogLevel) -> String {
    format!("{}.{}", LOG_TAG_PREFIX, level)
}

#[cfg(test)]
#[path = "level_tests.rs"]
mod tests;
