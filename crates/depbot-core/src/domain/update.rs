//! Candidate updates produced by the ecosystem scanners.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::version;

/// A dependency-management system with its own version source and file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ecosystem {
    Npm,
    Composer,
    /// Generic constraint file (`deps.yaml` and friends).
    Constraint,
    GithubActions,
    Docker,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 5] = [
        Ecosystem::Npm,
        Ecosystem::Composer,
        Ecosystem::Constraint,
        Ecosystem::GithubActions,
        Ecosystem::Docker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Composer => "composer",
            Ecosystem::Constraint => "constraint",
            Ecosystem::GithubActions => "github-actions",
            Ecosystem::Docker => "docker",
        }
    }

    /// Manifest file names whose removal from the repository root makes
    /// every request for this ecosystem obsolete.
    pub fn authoritative_manifests(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::Npm => &["package.json"],
            Ecosystem::Composer => &["composer.json"],
            Ecosystem::Constraint => &[
                "deps.yaml",
                "deps.yml",
                "dependencies.yaml",
                "dependencies.yml",
            ],
            Ecosystem::GithubActions | Ecosystem::Docker => &[],
        }
    }

    /// Infer the ecosystem from a manifest path.
    pub fn from_path(path: &str) -> Option<Ecosystem> {
        let normalized = path.replace('\\', "/");
        let file_name = Path::new(&normalized)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if normalized.contains(".github/workflows/")
            && (file_name.ends_with(".yml") || file_name.ends_with(".yaml"))
        {
            return Some(Ecosystem::GithubActions);
        }
        if file_name.starts_with("Dockerfile")
            || file_name.ends_with(".dockerfile")
            || file_name.starts_with("docker-compose")
        {
            return Some(Ecosystem::Docker);
        }

        match file_name {
            "package.json" | "package-lock.json" | "yarn.lock" | "pnpm-lock.yaml" | "bun.lock" => {
                Some(Ecosystem::Npm)
            }
            "composer.json" | "composer.lock" => Some(Ecosystem::Composer),
            name if Ecosystem::Constraint.authoritative_manifests().contains(&name) => {
                Some(Ecosystem::Constraint)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an upgrade. Ordered so that `max` yields the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Patch,
    Minor,
    Major,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Patch => "patch",
            UpdateType::Minor => "minor",
            UpdateType::Major => "major",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One proposed dependency bump. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateUpdate {
    pub name: String,
    pub current_version: String,
    pub new_version: String,
    pub update_type: UpdateType,
    pub ecosystem: Ecosystem,
    /// Manifest the dependency was found in, relative to the repository root.
    pub source_file: String,
}

impl CandidateUpdate {
    /// Build a candidate, classifying the update type from the two versions.
    pub fn new(
        name: impl Into<String>,
        current_version: impl Into<String>,
        new_version: impl Into<String>,
        ecosystem: Ecosystem,
        source_file: impl Into<String>,
    ) -> Self {
        let current_version = current_version.into();
        let new_version = new_version.into();
        let update_type = version::classify(&current_version, &new_version);
        Self {
            name: name.into(),
            current_version,
            new_version,
            update_type,
            ecosystem,
            source_file: source_file.into(),
        }
    }

    pub fn is_major(&self) -> bool {
        self.update_type == UpdateType::Major
    }
}

/// Generated content for one file, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub path: String,
    pub content: String,
}

impl FileUpdate {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}
