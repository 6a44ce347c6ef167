//! Per-group reconciliation decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::update::Ecosystem;

/// Why a group produced no write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The matched request already proposes exactly these packages and versions.
    Unchanged,
    /// Content generation yielded no files.
    GenerationEmpty,
    /// Generated files are byte-identical to what is already on disk.
    NoContentChange,
}

/// Why an existing request must be closed instead of updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseReason {
    /// The request bumps a dynamic marker the config now says to leave alone.
    DynamicVersionRespected { package: String, version: String },
    /// The request touches a file that is now under an ignore rule.
    IgnoredPath { path: String },
    /// None of the files the request touches exist anymore.
    ManifestRemoved { paths: Vec<String> },
    /// The single authoritative manifest of an ecosystem was removed.
    AuthoritativeManifestRemoved { ecosystem: Ecosystem, path: String },
    /// Every package in the request is already at or beyond its target.
    AlreadySatisfied,
}

impl CloseReason {
    /// Explanatory comment posted on the request before it is closed.
    pub fn comment(&self) -> String {
        match self {
            CloseReason::DynamicVersionRespected { package, version } => format!(
                "Closing: `{package}` is pinned to the dynamic version `{version}`, \
                 which the current configuration leaves untouched."
            ),
            CloseReason::IgnoredPath { path } => {
                format!("Closing: `{path}` is now covered by an ignore rule.")
            }
            CloseReason::ManifestRemoved { paths } => format!(
                "Closing: the files this request updates no longer exist ({}).",
                paths
                    .iter()
                    .map(|p| format!("`{p}`"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            CloseReason::AuthoritativeManifestRemoved { ecosystem, path } => format!(
                "Closing: `{path}` was removed, so {ecosystem} updates no longer apply."
            ),
            CloseReason::AlreadySatisfied => "Closing: every dependency in this request is \
                 already at or beyond its target version."
                .to_string(),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::DynamicVersionRespected { package, .. } => {
                write!(f, "dynamic version respected for {package}")
            }
            CloseReason::IgnoredPath { path } => write!(f, "ignored path {path}"),
            CloseReason::ManifestRemoved { .. } => f.write_str("manifest removed"),
            CloseReason::AuthoritativeManifestRemoved { ecosystem, .. } => {
                write!(f, "{ecosystem} manifest removed")
            }
            CloseReason::AlreadySatisfied => f.write_str("already satisfied"),
        }
    }
}

/// What the engine did for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Skip {
        reason: SkipReason,
    },
    CreateNew {
        number: u64,
        url: String,
        payload_digest: String,
    },
    UpdateInPlace {
        number: u64,
        /// False when the branch was recreated with byte-identical content.
        content_changed: bool,
        payload_digest: String,
    },
    Close {
        number: u64,
        reason: CloseReason,
    },
}

impl Decision {
    /// Whether this decision performed any write on the platform.
    pub fn is_write(&self) -> bool {
        !matches!(self, Decision::Skip { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Skip { .. } => "skip",
            Decision::CreateNew { .. } => "create",
            Decision::UpdateInPlace { .. } => "update",
            Decision::Close { .. } => "close",
        }
    }
}

/// Position of a group in the per-group state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    NoMatch,
    /// No open request, but the deterministic branch survived a prior run.
    BranchOrphaned,
    MatchedSame,
    MatchedDifferent,
    MatchedStale,
}
