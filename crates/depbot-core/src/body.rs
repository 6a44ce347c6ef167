//! Recovering "which packages and versions does this request represent"
//! from a change-request body.
//!
//! Bodies written by this bot carry a hidden machine-readable block:
//!
//! ```text
//! <!-- depbot:updates {"version":1,"updates":[{"name":"react","from":"18.0.0","to":"18.3.0",...}]} -->
//! ```
//!
//! Bodies without the block (older bot versions, hand-edited bodies) are
//! scraped for markdown table rows, "update `x` from `a` to `b`" sentences and
//! backticked manifest paths. Scraping is a compatibility fallback only.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateUpdate, Ecosystem};

const MARKER_OPEN: &str = "<!-- depbot:updates ";
const MARKER_CLOSE: &str = " -->";
const MARKER_SCHEMA_VERSION: u32 = 1;

static TABLE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\|\s*\[?`?(?P<name>[^\]`|\s]+)`?\]?(?:\([^)]*\))?\s*\|\s*\[?`?(?P<from>[^`|\s]+)`?\s*(?:->|→)\s*`?(?P<to>[^`|\s\]]+)`?",
    )
    .expect("table row regex is valid")
});

static SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)update\s+`(?P<name>[^`]+)`\s+from\s+`(?P<from>[^`]+)`\s+to\s+`(?P<to>[^`]+)`")
        .expect("sentence regex is valid")
});

static FILE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"`(?P<file>[^`\s]*(?:package\.json|composer\.json|composer\.lock|deps\.ya?ml|dependencies\.ya?ml|Dockerfile[^`\s]*|\.github/workflows/[^`\s]+))`",
    )
    .expect("file reference regex is valid")
});

/// One package bump as recorded in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedUpdate {
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<Ecosystem>,
}

impl From<&CandidateUpdate> for RecordedUpdate {
    fn from(update: &CandidateUpdate) -> Self {
        Self {
            name: update.name.clone(),
            from: update.current_version.clone(),
            to: update.new_version.clone(),
            file: Some(update.source_file.clone()),
            ecosystem: Some(update.ecosystem),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MarkerPayload {
    version: u32,
    updates: Vec<RecordedUpdate>,
}

/// Where the parsed contents came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource {
    Marker,
    Legacy,
    /// Nothing recognizable was found.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyContents {
    pub source: BodySource,
    pub updates: Vec<RecordedUpdate>,
    /// Manifest paths mentioned outside of `updates`.
    pub files: Vec<String>,
}

impl BodyContents {
    pub fn package_targets(&self) -> BTreeSet<(String, String)> {
        self.updates
            .iter()
            .map(|u| (u.name.clone(), u.to.clone()))
            .collect()
    }

    /// Every file path the request claims to touch.
    pub fn referenced_files(&self) -> BTreeSet<String> {
        self.updates
            .iter()
            .filter_map(|u| u.file.clone())
            .chain(self.files.iter().cloned())
            .map(|f| f.trim_start_matches("./").to_string())
            .collect()
    }
}

/// Render the hidden block for a set of updates.
pub fn encode_marker(updates: &[CandidateUpdate]) -> String {
    let payload = MarkerPayload {
        version: MARKER_SCHEMA_VERSION,
        updates: updates.iter().map(RecordedUpdate::from).collect(),
    };
    // Serializing plain strings and enums cannot fail.
    let json = serde_json::to_string(&payload).unwrap_or_default();
    format!("{MARKER_OPEN}{json}{MARKER_CLOSE}")
}

/// Parse a request body, preferring the structured marker.
pub fn parse_body(body: &str) -> BodyContents {
    if let Some(updates) = parse_marker(body) {
        return BodyContents {
            source: BodySource::Marker,
            updates,
            files: Vec::new(),
        };
    }
    parse_legacy(body)
}

fn parse_marker(body: &str) -> Option<Vec<RecordedUpdate>> {
    let start = body.find(MARKER_OPEN)? + MARKER_OPEN.len();
    let end = start + body[start..].find(MARKER_CLOSE)?;
    match serde_json::from_str::<MarkerPayload>(&body[start..end]) {
        Ok(payload) => Some(payload.updates),
        Err(e) => {
            tracing::warn!(error = %e, "malformed update marker, falling back to body scraping");
            None
        }
    }
}

fn parse_legacy(body: &str) -> BodyContents {
    let mut updates: Vec<RecordedUpdate> = Vec::new();
    let mut seen = BTreeSet::new();

    for caps in TABLE_ROW.captures_iter(body).chain(SENTENCE.captures_iter(body)) {
        let name = caps["name"].to_string();
        let to = caps["to"].to_string();
        if !seen.insert((name.clone(), to.clone())) {
            continue;
        }
        updates.push(RecordedUpdate {
            name,
            from: caps["from"].to_string(),
            to,
            file: None,
            ecosystem: None,
        });
    }

    let files: Vec<String> = FILE_REF
        .captures_iter(body)
        .map(|caps| caps["file"].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let source = if updates.is_empty() && files.is_empty() {
        BodySource::Empty
    } else {
        BodySource::Legacy
    };

    BodyContents {
        source,
        updates,
        files,
    }
}
