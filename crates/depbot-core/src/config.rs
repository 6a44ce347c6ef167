//! Reconciliation configuration.
//!
//! One immutable [`ReconciliationConfig`] is loaded per pass (usually from
//! `depbot.toml`) and passed by reference into every component.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ReconcileError, UpdateType};
use crate::matcher::slugify;
use crate::pattern::PatternSet;

/// How the bot identifies itself on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotIdentity {
    /// Account that authors the bot's requests.
    pub login: String,
    /// Prefix of every branch the bot creates.
    pub branch_prefix: String,
    /// Substrings that mark a branch or author as another automation tool.
    pub foreign_markers: Vec<String>,
}

impl Default for BotIdentity {
    fn default() -> Self {
        Self {
            login: "depbot[bot]".to_string(),
            branch_prefix: "depbot/".to_string(),
            foreign_markers: vec!["dependabot".to_string(), "renovate".to_string()],
        }
    }
}

/// A user-defined grouping rule. Rules are applied in order; first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRule {
    pub name: String,
    /// Package-name globs, or regexes written as `/.../`.
    pub patterns: Vec<String>,
    /// Restrict the rule to these update types. `None` accepts all.
    #[serde(default)]
    pub update_types: Option<Vec<UpdateType>>,
}

impl GroupRule {
    pub fn accepts(&self, update_type: UpdateType) -> bool {
        self.update_types
            .as_ref()
            .is_none_or(|types| types.contains(&update_type))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub base_branch: String,
    pub bot: BotIdentity,
    /// Leave dynamic markers (`latest`, `*`, `main`, ...) untouched.
    pub respect_latest: bool,
    /// Drop major updates before grouping.
    pub exclude_major: bool,
    /// Path globs whose manifests are never updated.
    pub ignore_paths: Vec<String>,
    pub groups: Vec<GroupRule>,
    pub labels: Vec<String>,
    pub reviewers: Vec<String>,
    pub assignees: Vec<String>,
    /// Run open bot requests that no group matched through the auto-close checks.
    pub close_unmatched: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            base_branch: "main".to_string(),
            bot: BotIdentity::default(),
            respect_latest: true,
            exclude_major: false,
            ignore_paths: Vec::new(),
            groups: Vec::new(),
            labels: Vec::new(),
            reviewers: Vec::new(),
            assignees: Vec::new(),
            close_unmatched: false,
        }
    }
}

impl ReconciliationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ReconcileError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ReconcileError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ReconcileError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::InvalidConfig(format!("read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check that every pattern compiles and the identity is usable.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.base_branch.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "base_branch must not be empty".to_string(),
            ));
        }
        if self.bot.branch_prefix.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "bot.branch_prefix must not be empty".to_string(),
            ));
        }
        PatternSet::for_paths(&self.ignore_paths)?;
        let mut slugs = HashSet::new();
        for rule in &self.groups {
            let slug = slugify(&rule.name);
            if slug.is_empty() {
                return Err(ReconcileError::InvalidConfig(format!(
                    "group rule name {:?} has no letters or digits",
                    rule.name
                )));
            }
            if !slugs.insert(slug.clone()) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "group rules share the branch slug '{slug}'"
                )));
            }
            PatternSet::for_names(&rule.patterns)?;
        }
        Ok(())
    }

    pub fn ignore_set(&self) -> Result<PatternSet, ReconcileError> {
        PatternSet::for_paths(&self.ignore_paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.base_branch, "main");
        assert_eq!(config.bot.branch_prefix, "depbot/");
        assert!(config.respect_latest);
        assert!(!config.exclude_major);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_with_groups() {
        let config = ReconciliationConfig::from_toml_str(
            r#"
            base_branch = "develop"
            exclude_major = true
            ignore_paths = ["vendor/**"]
            labels = ["deps"]

            [bot]
            login = "acme-bot"

            [[groups]]
            name = "react ecosystem"
            patterns = ["react", "react-*", "@types/react*"]

            [[groups]]
            name = "linters"
            patterns = ["/^eslint/"]
            update_types = ["minor", "patch"]
            "#,
        )
        .unwrap();

        assert_eq!(config.base_branch, "develop");
        assert!(config.exclude_major);
        assert_eq!(config.bot.login, "acme-bot");
        assert_eq!(config.bot.branch_prefix, "depbot/");
        assert_eq!(config.groups.len(), 2);
        assert!(config.groups[0].accepts(UpdateType::Major));
        assert!(!config.groups[1].accepts(UpdateType::Major));
        assert!(config.groups[1].accepts(UpdateType::Patch));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = ReconciliationConfig::from_toml_str(
            r#"
            [[groups]]
            name = "broken"
            patterns = ["/(/"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(_)));
    }

    #[test]
    fn test_rules_sharing_a_branch_slug_rejected() {
        let err = ReconciliationConfig::from_toml_str(
            r#"
            [[groups]]
            name = "React Ecosystem"
            patterns = ["react"]

            [[groups]]
            name = "react-ecosystem"
            patterns = ["react-dom"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(m) if m.contains("react-ecosystem")));
    }

    #[test]
    fn test_rule_name_without_slug_rejected() {
        let err = ReconciliationConfig::from_toml_str(
            r#"
            [[groups]]
            name = "!!!"
            patterns = ["x"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReconciliationConfig::load(&dir.path().join("depbot.toml")).unwrap();
        assert_eq!(config, ReconciliationConfig::default());
    }
}
