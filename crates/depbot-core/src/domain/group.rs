//! Named clusters of candidate updates, one per change request.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::update::{CandidateUpdate, Ecosystem, UpdateType};

/// A non-empty set of updates slated for a single change request.
///
/// `title` and `body` start empty and are filled in by the renderer at the
/// start of each group's reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroup {
    pub name: String,
    pub title: String,
    pub body: String,
    /// Most severe update type among `updates`.
    pub update_type: UpdateType,
    pub updates: Vec<CandidateUpdate>,
}

impl UpdateGroup {
    pub fn new(name: impl Into<String>, updates: Vec<CandidateUpdate>) -> Self {
        let update_type = updates
            .iter()
            .map(|u| u.update_type)
            .max()
            .unwrap_or(UpdateType::Patch);
        Self {
            name: name.into(),
            title: String::new(),
            body: String::new(),
            update_type,
            updates,
        }
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn ecosystems(&self) -> BTreeSet<Ecosystem> {
        self.updates.iter().map(|u| u.ecosystem).collect()
    }

    /// The (package, target version) pairs this group proposes.
    pub fn package_targets(&self) -> BTreeSet<(String, String)> {
        self.updates
            .iter()
            .map(|u| (u.name.clone(), u.new_version.clone()))
            .collect()
    }

    /// Source files touched by the group, deduplicated and sorted.
    pub fn source_files(&self) -> BTreeSet<&str> {
        self.updates.iter().map(|u| u.source_file.as_str()).collect()
    }
}
