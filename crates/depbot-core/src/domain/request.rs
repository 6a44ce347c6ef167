//! Change requests as seen on (and sent to) the hosting platform.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Open,
    Closed,
    Merged,
}

/// A change request that already exists on the platform. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingChangeRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
    pub author: String,
    pub labels: Vec<String>,
    pub state: RequestState,
}

/// Payload for opening a new change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub labels: Vec<String>,
    pub reviewers: Vec<String>,
    pub assignees: Vec<String>,
}

/// Payload for amending an existing change request in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUpdate {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Identity of a freshly created change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRequest {
    pub number: u64,
    pub url: String,
}

/// Which matcher strategy identified an existing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    ExactBranch,
    TitleExact,
    LegacyBranch,
    TitleSimilarity,
}

/// Outcome of looking up the existing request for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: Option<ExistingChangeRequest>,
    pub basis: Option<MatchBasis>,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            matched: None,
            basis: None,
        }
    }

    pub fn found(request: ExistingChangeRequest, basis: MatchBasis) -> Self {
        Self {
            matched: Some(request),
            basis: Some(basis),
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}
