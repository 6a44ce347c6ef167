//! Pass reports: what the engine decided for each group, serialisable to
//! JSON and renderable as markdown for job summaries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateUpdate, Decision, ReconcileState};
use crate::scan::ScanFailure;

/// Why a candidate never reached grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NotAnUpgrade,
    DynamicVersion,
    MajorExcluded,
    IgnoredPath,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DropReason::NotAnUpgrade => "not an upgrade",
            DropReason::DynamicVersion => "dynamic version respected",
            DropReason::MajorExcluded => "major updates excluded",
            DropReason::IgnoredPath => "ignored path",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedCandidate {
    pub update: CandidateUpdate,
    pub reason: DropReason,
}

/// Outcome for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group: String,
    pub branch: String,
    /// How far the state machine got; `None` if the group failed before matching.
    pub state: Option<ReconcileState>,
    pub result: Result<Decision, String>,
}

impl GroupReport {
    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }

    pub fn is_write(&self) -> bool {
        self.result.as_ref().is_ok_and(Decision::is_write)
    }
}

/// Outcome for an open request swept because no group claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweptRequest {
    pub number: u64,
    pub head_branch: String,
    pub result: Result<Decision, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub pass_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scan_failures: Vec<ScanFailure>,
    pub dropped: Vec<DroppedCandidate>,
    pub groups: Vec<GroupReport>,
    #[serde(default)]
    pub swept: Vec<SweptRequest>,
}

impl ReconciliationReport {
    pub fn new(pass_id: impl Into<String>) -> Self {
        Self {
            pass_id: pass_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            scan_failures: Vec::new(),
            dropped: Vec::new(),
            groups: Vec::new(),
            swept: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    fn count(&self, label: &str) -> usize {
        self.groups
            .iter()
            .filter(|g| g.result.as_ref().is_ok_and(|d| d.label() == label))
            .count()
    }

    pub fn created(&self) -> usize {
        self.count("create")
    }

    pub fn updated(&self) -> usize {
        self.count("update")
    }

    pub fn closed(&self) -> usize {
        self.count("close")
            + self
                .swept
                .iter()
                .filter(|s| matches!(s.result, Ok(Decision::Close { .. })))
                .count()
    }

    pub fn skipped(&self) -> usize {
        self.count("skip")
    }

    pub fn failed(&self) -> usize {
        self.groups.iter().filter(|g| g.is_failed()).count()
            + self.swept.iter().filter(|s| s.result.is_err()).count()
    }

    /// Groups and swept requests that wrote to the platform.
    pub fn writes(&self) -> usize {
        self.groups.iter().filter(|g| g.is_write()).count()
            + self
                .swept
                .iter()
                .filter(|s| s.result.as_ref().is_ok_and(Decision::is_write))
                .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Render a markdown summary.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Dependency Reconciliation\n\n");
        out.push_str(&format!("- pass: `{}`\n", self.pass_id));
        out.push_str(&format!(
            "- created: {}\n- updated: {}\n- closed: {}\n- skipped: {}\n- failed: {}\n\n",
            self.created(),
            self.updated(),
            self.closed(),
            self.skipped(),
            self.failed()
        ));

        if !self.groups.is_empty() {
            out.push_str("## Groups\n\n| Group | Branch | Outcome |\n|---|---|---|\n");
            for g in &self.groups {
                out.push_str(&format!(
                    "| {} | `{}` | {} |\n",
                    g.group,
                    g.branch,
                    describe(&g.result)
                ));
            }
            out.push('\n');
        }

        if !self.swept.is_empty() {
            out.push_str("## Swept\n\n");
            for s in &self.swept {
                out.push_str(&format!("- #{} `{}`: {}\n", s.number, s.head_branch, describe(&s.result)));
            }
            out.push('\n');
        }

        if !self.dropped.is_empty() {
            out.push_str("## Dropped Candidates\n\n");
            for d in &self.dropped {
                out.push_str(&format!(
                    "- `{}` {} -> {}: {}\n",
                    d.update.name, d.update.current_version, d.update.new_version, d.reason
                ));
            }
            out.push('\n');
        }

        if !self.scan_failures.is_empty() {
            out.push_str("## Scan Failures\n\n");
            for f in &self.scan_failures {
                out.push_str(&format!("- {}: {}\n", f.source, f.error));
            }
        }
        out
    }
}

fn describe(result: &Result<Decision, String>) -> String {
    match result {
        Ok(Decision::Skip { reason }) => format!("skipped ({reason:?})"),
        Ok(Decision::CreateNew { number, .. }) => format!("created #{number}"),
        Ok(Decision::UpdateInPlace {
            number,
            content_changed,
            ..
        }) => {
            if *content_changed {
                format!("updated #{number}")
            } else {
                format!("refreshed #{number}")
            }
        }
        Ok(Decision::Close { number, reason }) => format!("closed #{number} ({reason})"),
        Err(e) => format!("**failed**: {e}"),
    }
}
