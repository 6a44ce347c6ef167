//! Concurrent fan-out over the ecosystem scanners.
//!
//! Every [`DependencySource`] is scanned concurrently and all results are
//! joined before returning: grouping needs the complete candidate set. A
//! failing source is logged and recorded; the remaining sources still count.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateUpdate, Ecosystem, ReconcileError};

/// One ecosystem's scanner.
#[async_trait]
pub trait DependencySource: Send + Sync {
    /// Short name used in logs and reports (usually the ecosystem).
    fn name(&self) -> &str;

    async fn scan(&self) -> Result<Vec<CandidateUpdate>, ReconcileError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Default, Clone)]
pub struct ScanOutcome {
    pub updates: Vec<CandidateUpdate>,
    pub failures: Vec<ScanFailure>,
}

/// Run every source concurrently and concatenate the results in source order.
pub async fn collect_candidates(sources: &[Arc<dyn DependencySource>]) -> ScanOutcome {
    let results = join_all(sources.iter().map(|s| s.scan())).await;

    let mut outcome = ScanOutcome::default();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(updates) => {
                tracing::debug!(source = source.name(), count = updates.len(), "scan finished");
                outcome.updates.extend(updates);
            }
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "scan failed");
                outcome.failures.push(ScanFailure {
                    source: source.name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    outcome
}

/// A scanner result as written to disk by an external scanner.
///
/// The update type is not stored; it is recomputed from the two versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub name: String,
    #[serde(alias = "current")]
    pub current_version: String,
    #[serde(alias = "latest")]
    pub new_version: String,
    pub ecosystem: Ecosystem,
    #[serde(alias = "file")]
    pub source_file: String,
}

impl From<ScanRecord> for CandidateUpdate {
    fn from(r: ScanRecord) -> Self {
        CandidateUpdate::new(r.name, r.current_version, r.new_version, r.ecosystem, r.source_file)
    }
}

/// Reads a JSON array of [`ScanRecord`]s produced by an external scanner.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("updates")
            .to_string();
        Self { name, path }
    }
}

#[async_trait]
impl DependencySource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self) -> Result<Vec<CandidateUpdate>, ReconcileError> {
        let scan_error = |reason: String| ReconcileError::Scan {
            ecosystem: self.name.clone(),
            reason,
        };
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| scan_error(format!("read {}: {e}", self.path.display())))?;
        let records: Vec<ScanRecord> =
            serde_json::from_str(&raw).map_err(|e| scan_error(e.to_string()))?;
        Ok(records.into_iter().map(CandidateUpdate::from).collect())
    }
}

/// Fixed candidate list.
#[derive(Debug, Clone)]
pub struct StaticSource {
    pub name: String,
    pub updates: Vec<CandidateUpdate>,
}

#[async_trait]
impl DependencySource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self) -> Result<Vec<CandidateUpdate>, ReconcileError> {
        Ok(self.updates.clone())
    }
}
