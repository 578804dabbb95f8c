// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glob-pattern tag router.
//!
//! Patterns are globs over dot-delimited tags: `*` matches exactly one
//! path segment, `**` matches zero or more segments including the
//! joining dot, and literal segments match themselves. Patterns compile
//! once at registration; lookup is a linear scan where the
//! earliest-added match wins.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid tag pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Ordered `(pattern, destination)` table. Built during engine bring-up,
/// read-only afterwards; `route` is pure and safe under concurrent reads.
pub struct TagRouter<T> {
    routes: Vec<(Regex, T)>,
}

impl<T> Default for TagRouter<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> TagRouter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append it to the table. Compile errors
    /// surface here, synchronously.
    pub fn add(&mut self, pattern: &str, dest: T) -> Result<(), RouterError> {
        let re = compile_pattern(pattern).map_err(|source| RouterError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.routes.push((re, dest));
        Ok(())
    }

    /// First registered destination whose pattern matches `tag`.
    pub fn route(&self, tag: &str) -> Option<&T> {
        self.routes
            .iter()
            .find(|(re, _)| re.is_match(tag))
            .map(|(_, dest)| dest)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

/// Translate a tag glob into an anchored regex. Literal dots are escaped
/// first, then `**` (with its preceding separator) and `*` are rewritten.
fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let body = if pattern == "**" {
        ".*".to_string()
    } else {
        let escaped = pattern.replace('.', r"\.");
        let expanded = escaped.replace("**", r"(\..+|)");
        // `a.**` must also match the bare `a`: fold the separator into
        // the optional-suffix group.
        let folded = expanded.replace(r"\.(\..+|)", r"(\..+|)");
        folded.replace('*', "[^.]*")
    };
    Regex::new(&format!("^{body}$"))
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
