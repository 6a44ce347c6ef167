//! Structured observability hooks for reconciliation passes.
//!
//! - Pass-scoped tracing span via the [`PassSpan`] RAII guard
//! - Emission functions for pass start/finish, per-group decisions and
//!   failures, and dropped candidates
//!
//! Events are emitted at `info!` (failures and drops at `warn!`), filtered
//! through `DEPBOT_LOG`.

use tracing::{info, warn};

use crate::domain::{CandidateUpdate, Decision, ReconcileState};

/// RAII guard that enters a pass-scoped span.
///
/// ```ignore
/// let _span = PassSpan::enter("0b7c...");
/// // every event below carries pass_id
/// ```
pub struct PassSpan {
    _span: tracing::span::EnteredSpan,
}

impl PassSpan {
    pub fn enter(pass_id: &str) -> Self {
        Self {
            _span: pass_span(pass_id).entered(),
        }
    }
}

/// The pass span itself, for instrumenting futures.
pub fn pass_span(pass_id: &str) -> tracing::Span {
    tracing::info_span!("depbot.pass", pass_id = %pass_id)
}

pub fn emit_pass_started(pass_id: &str, candidates: usize, groups: usize) {
    info!(
        event = "pass.started",
        pass_id = %pass_id,
        candidates = candidates,
        groups = groups,
    );
}

pub fn emit_group_decided(group: &str, state: ReconcileState, decision: &Decision) {
    info!(
        event = "group.decided",
        group = %group,
        state = ?state,
        decision = decision.label(),
    );
}

pub fn emit_group_failed(group: &str, error: &dyn std::fmt::Display) {
    warn!(event = "group.failed", group = %group, error = %error);
}

/// Emit event: pass finished with per-outcome counts.
pub fn emit_pass_finished(pass_id: &str, duration_ms: u64, writes: usize, failed: usize) {
    info!(
        event = "pass.finished",
        pass_id = %pass_id,
        duration_ms = duration_ms,
        writes = writes,
        failed = failed,
        success = failed == 0,
    );
}

pub fn emit_candidate_dropped(update: &CandidateUpdate, reason: &str) {
    warn!(
        event = "candidate.dropped",
        package = %update.name,
        from = %update.current_version,
        to = %update.new_version,
        reason = %reason,
    );
}
