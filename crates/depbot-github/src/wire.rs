//! REST payloads, limited to the fields depbot reads or writes.

use serde::{Deserialize, Serialize};

use depbot_core::{ExistingChangeRequest, RequestState};

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub head: PullRef,
    pub base: PullRef,
    pub user: User,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl From<PullRequest> for ExistingChangeRequest {
    fn from(pr: PullRequest) -> Self {
        let state = match (pr.state.as_str(), pr.merged_at.is_some()) {
            ("open", _) => RequestState::Open,
            (_, true) => RequestState::Merged,
            _ => RequestState::Closed,
        };
        ExistingChangeRequest {
            number: pr.number,
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            head_branch: pr.head.ref_name,
            base_branch: pr.base.ref_name,
            author: pr.user.login,
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
            state,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRef<'a> {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePull<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePull<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Labels<'a> {
    pub labels: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct Reviewers<'a> {
    pub reviewers: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignees<'a> {
    pub assignees: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment<'a> {
    pub body: &'a str,
}

/// Error body GitHub returns alongside non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}
