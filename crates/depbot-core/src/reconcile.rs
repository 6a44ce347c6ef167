//! The reconciliation pass.
//!
//! One pass admits candidates, groups them, lists open requests once, then
//! walks the groups **sequentially** through the per-group state machine:
//!
//! ```text
//!            ┌─ auto-close triggered ──────────────► Close
//! matched ───┼─ same packages/targets ─────────────► Skip
//!            └─ different ─► regenerate ─► commit ─► UpdateInPlace
//! no match ─► (delete orphaned branch) ─► generate ─► create ─► CreateNew
//! ```
//!
//! Every group's outcome is an explicit `Result<Decision, String>` in the
//! report. Only a failure to list open requests aborts the pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

use crate::auto_close::AutoCloseEvaluator;
use crate::body::parse_body;
use crate::config::ReconciliationConfig;
use crate::content_diff::{differs_from_disk, has_differences};
use crate::domain::{
    CandidateUpdate, CloseReason, Decision, ExistingChangeRequest, FileUpdate, NewRequest,
    ReconcileError, ReconcileState, RequestUpdate, Result, SkipReason, UpdateGroup,
};
use crate::grouping::group_updates;
use crate::matcher::{branch_name, PrMatcher};
use crate::obs;
use crate::patch::TextPatcher;
use crate::platform::{FileGenerator, Platform, Renderer, Workspace};
use crate::report::{DropReason, DroppedCandidate, GroupReport, ReconciliationReport, SweptRequest};
use crate::version;

/// Drives reconciliation passes against one repository.
pub struct Reconciler {
    platform: Arc<dyn Platform>,
    workspace: Arc<dyn Workspace>,
    renderer: Arc<dyn Renderer>,
    generators: Vec<Arc<dyn FileGenerator>>,
}

/// Read-only state shared by every group of a pass.
struct Pass<'a> {
    config: &'a ReconciliationConfig,
    open: &'a [ExistingChangeRequest],
    fresh: &'a [CandidateUpdate],
    evaluator: AutoCloseEvaluator<'a>,
}

impl Reconciler {
    /// A reconciler using [`TextPatcher`] for every ecosystem.
    pub fn new(
        platform: Arc<dyn Platform>,
        workspace: Arc<dyn Workspace>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            platform,
            workspace,
            renderer,
            generators: vec![Arc::new(TextPatcher::new())],
        }
    }

    /// Replace the generators. Earlier generators win for ecosystems several
    /// of them handle.
    pub fn with_generators(mut self, generators: Vec<Arc<dyn FileGenerator>>) -> Self {
        self.generators = generators;
        self
    }

    /// Run one pass over `updates`.
    pub async fn reconcile(
        &self,
        updates: &[CandidateUpdate],
        config: &ReconciliationConfig,
    ) -> Result<ReconciliationReport> {
        let pass_id = Uuid::new_v4().to_string();
        let span = obs::pass_span(&pass_id);
        self.run_pass(pass_id, updates, config).instrument(span).await
    }

    async fn run_pass(
        &self,
        pass_id: String,
        updates: &[CandidateUpdate],
        config: &ReconciliationConfig,
    ) -> Result<ReconciliationReport> {
        config.validate()?;
        let mut report = ReconciliationReport::new(pass_id);

        let (admitted, dropped) = admit(updates, config)?;
        report.dropped = dropped;

        let groups = self.plan(&admitted, config)?;
        obs::emit_pass_started(&report.pass_id, admitted.len(), groups.len());

        let open = self
            .platform
            .list_open_requests()
            .await
            .map_err(ReconcileError::ListRequests)?;

        let pass = Pass {
            config,
            open: &open,
            fresh: &admitted,
            evaluator: AutoCloseEvaluator::new(config, self.workspace.as_ref())?,
        };
        let mut matcher = PrMatcher::new(config).with_groups(&groups);

        for group in &groups {
            let branch = branch_name(&group.name, &config.bot.branch_prefix);
            let mut state = None;
            let result = self
                .reconcile_group(&pass, &mut matcher, group, &branch, &mut state)
                .await;

            let result = match result {
                Ok(decision) => {
                    if let Some(state) = state {
                        obs::emit_group_decided(&group.name, state, &decision);
                    }
                    Ok(decision)
                }
                Err(e) => {
                    obs::emit_group_failed(&group.name, &e);
                    Err(e.to_string())
                }
            };
            report.groups.push(GroupReport {
                group: group.name.clone(),
                branch,
                state,
                result,
            });
        }

        if config.close_unmatched {
            report.swept = self.sweep_unmatched(&pass, &matcher).await;
        }

        report.finish();
        obs::emit_pass_finished(
            &report.pass_id,
            report.duration_ms(),
            report.writes(),
            report.failed(),
        );
        Ok(report)
    }

    /// Group admitted candidates and render their titles and bodies.
    pub fn plan(
        &self,
        admitted: &[CandidateUpdate],
        config: &ReconciliationConfig,
    ) -> Result<Vec<UpdateGroup>> {
        let mut groups = group_updates(admitted, config)?;
        for group in &mut groups {
            group.title = self.renderer.render_title(group);
            group.body = self.renderer.render_body(group);
        }
        Ok(groups)
    }

    async fn reconcile_group(
        &self,
        pass: &Pass<'_>,
        matcher: &mut PrMatcher<'_>,
        group: &UpdateGroup,
        branch: &str,
        state: &mut Option<ReconcileState>,
    ) -> Result<Decision> {
        let found = matcher.find_match(group, pass.open);
        let Some(existing) = found.matched else {
            return self.create_for_group(pass, group, branch, state).await;
        };
        matcher.claim(existing.number);
        tracing::debug!(
            group = %group.name,
            number = existing.number,
            basis = ?found.basis,
            "matched open request"
        );

        if let Some(reason) = pass.evaluator.should_close(&existing, pass.fresh) {
            *state = Some(ReconcileState::MatchedStale);
            return self.close(&existing, reason).await;
        }

        let recorded = parse_body(&existing.body);
        if recorded.updates.len() == group.len()
            && recorded.package_targets() == group.package_targets()
        {
            *state = Some(ReconcileState::MatchedSame);
            return Ok(Decision::Skip {
                reason: SkipReason::Unchanged,
            });
        }

        *state = Some(ReconcileState::MatchedDifferent);
        let files = self.generate(pass.config, group).await?;
        if let Some(reason) = self.empty_payload(group, &files) {
            return Ok(Decision::Skip { reason });
        }

        let content_changed =
            has_differences(self.workspace.as_ref(), &files, &existing.head_branch);
        if !content_changed {
            tracing::debug!(
                group = %group.name,
                branch = %existing.head_branch,
                "content identical, refreshing branch with the same payload"
            );
        }

        self.platform
            .commit_changes(
                &existing.head_branch,
                &group.title,
                &files,
                &pass.config.base_branch,
            )
            .await?;
        self.platform
            .update_request(
                existing.number,
                &RequestUpdate {
                    title: group.title.clone(),
                    body: group.body.clone(),
                    labels: self.labels(pass.config, group),
                },
            )
            .await?;

        Ok(Decision::UpdateInPlace {
            number: existing.number,
            content_changed,
            payload_digest: payload_digest(&files),
        })
    }

    async fn create_for_group(
        &self,
        pass: &Pass<'_>,
        group: &UpdateGroup,
        branch: &str,
        state: &mut Option<ReconcileState>,
    ) -> Result<Decision> {
        *state = Some(ReconcileState::NoMatch);

        if self.platform.branch_exists(branch).await? {
            if let Some(holder) = pass.open.iter().find(|r| r.head_branch == branch) {
                return Err(ReconcileError::BranchInUse {
                    branch: branch.to_string(),
                    number: holder.number,
                });
            }
            *state = Some(ReconcileState::BranchOrphaned);
            tracing::warn!(branch = %branch, "deleting orphaned branch from an earlier pass");
            self.platform.delete_branch(branch).await?;
        }

        let files = self.generate(pass.config, group).await?;
        if let Some(reason) = self.empty_payload(group, &files) {
            return Ok(Decision::Skip { reason });
        }

        let base = &pass.config.base_branch;
        self.platform.create_branch(branch, base).await?;
        self.platform
            .commit_changes(branch, &group.title, &files, base)
            .await?;
        let created = self
            .platform
            .create_request(&NewRequest {
                title: group.title.clone(),
                body: group.body.clone(),
                head: branch.to_string(),
                base: base.clone(),
                labels: self.labels(pass.config, group),
                reviewers: pass.config.reviewers.clone(),
                assignees: pass.config.assignees.clone(),
            })
            .await?;

        Ok(Decision::CreateNew {
            number: created.number,
            url: created.url,
            payload_digest: payload_digest(&files),
        })
    }

    /// Comment, close, and delete the head branch. Only the close itself
    /// must succeed.
    async fn close(&self, existing: &ExistingChangeRequest, reason: CloseReason) -> Result<Decision> {
        if let Err(e) = self
            .platform
            .add_comment(existing.number, &reason.comment())
            .await
        {
            tracing::warn!(number = existing.number, error = %e, "failed to comment before closing");
        }
        self.platform.close_request(existing.number).await?;
        if let Err(e) = self.platform.delete_branch(&existing.head_branch).await {
            tracing::warn!(
                branch = %existing.head_branch,
                error = %e,
                "failed to delete branch of closed request"
            );
        }
        Ok(Decision::Close {
            number: existing.number,
            reason,
        })
    }

    async fn sweep_unmatched(&self, pass: &Pass<'_>, matcher: &PrMatcher<'_>) -> Vec<SweptRequest> {
        let mut swept = Vec::new();
        for request in matcher.candidates(pass.open) {
            let Some(reason) = pass.evaluator.should_close(request, pass.fresh) else {
                continue;
            };
            let result = self.close(request, reason).await.map_err(|e| e.to_string());
            swept.push(SweptRequest {
                number: request.number,
                head_branch: request.head_branch.clone(),
                result,
            });
        }
        swept
    }

    /// Reset the working tree, then run the generators over the group.
    async fn generate(
        &self,
        config: &ReconciliationConfig,
        group: &UpdateGroup,
    ) -> Result<Vec<FileUpdate>> {
        if let Err(e) = self.workspace.reset_to_base(&config.base_branch) {
            tracing::warn!(
                group = %group.name,
                base = %config.base_branch,
                error = %e,
                "reset to clean base failed, generating anyway"
            );
        }

        let mut files: BTreeMap<String, FileUpdate> = BTreeMap::new();
        let mut remaining: Vec<CandidateUpdate> = group.updates.clone();
        for generator in &self.generators {
            let (mine, rest): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|u| generator.handles(u.ecosystem));
            remaining = rest;
            if mine.is_empty() {
                continue;
            }
            for file in generator
                .generate_file_updates(&mine, self.workspace.as_ref())
                .await?
            {
                files.insert(file.path.clone(), file);
            }
        }

        if let Some(orphan) = remaining.first() {
            return Err(ReconcileError::Generation {
                group: group.name.clone(),
                reason: format!("no generator handles {}", orphan.ecosystem),
            });
        }
        Ok(files.into_values().collect())
    }

    /// `Some` when the payload must not be committed: nothing was generated,
    /// or every file matches what is already on the base.
    fn empty_payload(&self, group: &UpdateGroup, files: &[FileUpdate]) -> Option<SkipReason> {
        if files.is_empty() {
            tracing::warn!(group = %group.name, "generation produced no files, skipping group");
            return Some(SkipReason::GenerationEmpty);
        }
        if !differs_from_disk(self.workspace.as_ref(), files) {
            tracing::warn!(group = %group.name, "generated files match the base, skipping group");
            return Some(SkipReason::NoContentChange);
        }
        None
    }

    fn labels(&self, config: &ReconciliationConfig, group: &UpdateGroup) -> Vec<String> {
        let mut labels = self.renderer.render_labels(group);
        for label in &config.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels
    }
}

/// Split candidates into those that may be grouped and those dropped.
pub fn admit(
    updates: &[CandidateUpdate],
    config: &ReconciliationConfig,
) -> Result<(Vec<CandidateUpdate>, Vec<DroppedCandidate>)> {
    let ignore = config.ignore_set()?;
    let mut admitted = Vec::with_capacity(updates.len());
    let mut dropped = Vec::new();

    for update in updates {
        let reason = if config.respect_latest && version::is_dynamic(&update.current_version) {
            Some(DropReason::DynamicVersion)
        } else if !version::is_upgrade(&update.current_version, &update.new_version) {
            Some(DropReason::NotAnUpgrade)
        } else if config.exclude_major && update.is_major() {
            Some(DropReason::MajorExcluded)
        } else if ignore.is_match(&update.source_file) {
            Some(DropReason::IgnoredPath)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                obs::emit_candidate_dropped(update, &reason.to_string());
                dropped.push(DroppedCandidate {
                    update: update.clone(),
                    reason,
                });
            }
            None => admitted.push(update.clone()),
        }
    }
    Ok((admitted, dropped))
}

/// SHA-256 over the file set, sorted by path.
pub fn payload_digest(files: &[FileUpdate]) -> String {
    let mut sorted: Vec<&FileUpdate> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for file in sorted {
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
