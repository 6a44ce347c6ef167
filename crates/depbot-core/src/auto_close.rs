//! Deciding whether a matched request is obsolete and must be closed
//! instead of updated.
//!
//! Checks run in order and the first trigger wins:
//! 1. the request bumps a dynamic marker while `respect_latest` is on
//! 2. the request touches a file under an ignore rule
//! 3. every file the request touches is gone, or an ecosystem's
//!    authoritative manifest it touches (at the repository root) is gone
//! 4. every package it proposes is already satisfied by the fresh scan

use std::cmp::Ordering;
use std::path::Path;

use crate::body::{parse_body, RecordedUpdate};
use crate::config::ReconciliationConfig;
use crate::domain::{CandidateUpdate, CloseReason, Ecosystem, ExistingChangeRequest, ReconcileError};
use crate::pattern::PatternSet;
use crate::platform::Workspace;
use crate::version;

pub struct AutoCloseEvaluator<'a> {
    config: &'a ReconciliationConfig,
    ignore: PatternSet,
    workspace: &'a dyn Workspace,
}

impl<'a> AutoCloseEvaluator<'a> {
    pub fn new(
        config: &'a ReconciliationConfig,
        workspace: &'a dyn Workspace,
    ) -> Result<Self, ReconcileError> {
        Ok(Self {
            config,
            ignore: config.ignore_set()?,
            workspace,
        })
    }

    /// `Some(reason)` when `existing` should be closed given the fresh updates.
    pub fn should_close(
        &self,
        existing: &ExistingChangeRequest,
        fresh: &[CandidateUpdate],
    ) -> Option<CloseReason> {
        let contents = parse_body(&existing.body);

        if self.config.respect_latest {
            if let Some(dynamic) = contents.updates.iter().find(|u| version::is_dynamic(&u.from)) {
                return Some(CloseReason::DynamicVersionRespected {
                    package: dynamic.name.clone(),
                    version: dynamic.from.clone(),
                });
            }
        }

        let files = contents.referenced_files();

        if let Some(path) = files.iter().find(|f| self.ignore.is_match(f)) {
            return Some(CloseReason::IgnoredPath { path: path.clone() });
        }

        if !files.is_empty() {
            let missing: Vec<String> = files
                .iter()
                .filter(|f| !self.workspace.file_exists(f))
                .cloned()
                .collect();

            if missing.len() == files.len() {
                return Some(CloseReason::ManifestRemoved { paths: missing });
            }
            if let Some((ecosystem, path)) = missing
                .iter()
                .find_map(|p| authoritative_ecosystem(p).map(|eco| (eco, p.clone())))
            {
                return Some(CloseReason::AuthoritativeManifestRemoved { ecosystem, path });
            }
        }

        if !contents.updates.is_empty() && contents.updates.iter().all(|u| is_satisfied(u, fresh)) {
            return Some(CloseReason::AlreadySatisfied);
        }

        None
    }
}

/// Convenience wrapper around [`AutoCloseEvaluator`].
pub fn should_close(
    existing: &ExistingChangeRequest,
    fresh: &[CandidateUpdate],
    config: &ReconciliationConfig,
    workspace: &dyn Workspace,
) -> Result<Option<CloseReason>, ReconcileError> {
    Ok(AutoCloseEvaluator::new(config, workspace)?.should_close(existing, fresh))
}

/// Only root manifests are authoritative; a nested one belongs to a single
/// workspace member.
fn authoritative_ecosystem(path: &str) -> Option<Ecosystem> {
    if path.trim_start_matches("./").contains('/') {
        return None;
    }
    let ecosystem = Ecosystem::from_path(path)?;
    let file_name = Path::new(path).file_name()?.to_str()?;
    ecosystem
        .authoritative_manifests()
        .contains(&file_name)
        .then_some(ecosystem)
}

/// A recorded bump is satisfied when the package left the fresh scan, or the
/// scan targets the same version and the installed one already reached it.
fn is_satisfied(recorded: &RecordedUpdate, fresh: &[CandidateUpdate]) -> bool {
    let mut same_name = fresh.iter().filter(|f| f.name == recorded.name).peekable();
    if same_name.peek().is_none() {
        return true;
    }
    same_name.any(|f| {
        f.new_version == recorded.to
            && matches!(
                version::compare(&f.current_version, &recorded.to),
                Some(Ordering::Equal | Ordering::Greater)
            )
    })
}
