//! Name and path pattern matching.
//!
//! Patterns are globs compiled with `globset`; a pattern written as
//! `/.../` is compiled as a regular expression instead.

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use crate::domain::ReconcileError;

#[derive(Debug, Clone)]
enum Compiled {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl Compiled {
    fn is_match(&self, value: &str) -> bool {
        match self {
            Compiled::Glob(glob) => glob.is_match(value),
            Compiled::Regex(re) => re.is_match(value),
        }
    }
}

/// An ordered set of compiled patterns; matches when any member matches.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Compiled>,
}

impl PatternSet {
    /// Compile patterns for package names. `*` crosses `/` (scoped packages).
    pub fn for_names(patterns: &[String]) -> Result<Self, ReconcileError> {
        Self::compile(patterns, false)
    }

    /// Compile patterns for repository paths. `*` stays within one segment,
    /// `**` crosses directories.
    pub fn for_paths(patterns: &[String]) -> Result<Self, ReconcileError> {
        Self::compile(patterns, true)
    }

    fn compile(patterns: &[String], literal_separator: bool) -> Result<Self, ReconcileError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let entry = match regex_body(pattern) {
                Some(body) => Compiled::Regex(Regex::new(body).map_err(|e| {
                    ReconcileError::InvalidConfig(format!("bad regex pattern {pattern:?}: {e}"))
                })?),
                None => Compiled::Glob(
                    GlobBuilder::new(pattern)
                        .literal_separator(literal_separator)
                        .build()
                        .map_err(|e| {
                            ReconcileError::InvalidConfig(format!(
                                "bad glob pattern {pattern:?}: {e}"
                            ))
                        })?
                        .compile_matcher(),
                ),
            };
            compiled.push(entry);
        }
        Ok(Self { patterns: compiled })
    }

    pub fn is_match(&self, value: &str) -> bool {
        let value = value.trim_start_matches("./");
        self.patterns.iter().any(|p| p.is_match(value))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn regex_body(pattern: &str) -> Option<&str> {
    pattern
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
        .filter(|body| !body.is_empty())
}
