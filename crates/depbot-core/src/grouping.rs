//! Partitioning of candidate updates into named groups.
//!
//! Configured rules are applied first, in order, each claiming the matching
//! updates that are still ungrouped. Whatever is left is bucketed by
//! ecosystem and by major vs non-major, so a default run yields a small,
//! bounded number of groups. Every input update lands in exactly one group,
//! and no two groups share a branch slug.

use std::collections::{BTreeMap, HashSet};

use crate::config::ReconciliationConfig;
use crate::domain::{CandidateUpdate, Ecosystem, ReconcileError, UpdateGroup};
use crate::matcher::slugify;
use crate::pattern::PatternSet;

/// Group `updates` according to `config.groups`, then the default heuristic.
pub fn group_updates(
    updates: &[CandidateUpdate],
    config: &ReconciliationConfig,
) -> Result<Vec<UpdateGroup>, ReconcileError> {
    let mut groups = Vec::new();
    let mut slugs: HashSet<String> = HashSet::new();
    let mut remaining: Vec<CandidateUpdate> = updates.to_vec();

    for rule in &config.groups {
        let patterns = PatternSet::for_names(&rule.patterns)?;
        let (taken, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|u| rule.accepts(u.update_type) && patterns.is_match(&u.name));
        remaining = rest;

        if !taken.is_empty() {
            let slug = slugify(&rule.name);
            if !slugs.insert(slug.clone()) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "group '{}' shares branch slug '{slug}' with an earlier group",
                    rule.name
                )));
            }
            tracing::debug!(group = %rule.name, count = taken.len(), "configured group matched");
            groups.push(UpdateGroup::new(rule.name.clone(), taken));
        }
    }

    for mut group in default_groups(remaining) {
        let base = group.name.clone();
        let mut attempt = 1;
        while !slugs.insert(slugify(&group.name)) {
            group.name = match attempt {
                1 => format!("{base} (default)"),
                n => format!("{base} (default {n})"),
            };
            attempt += 1;
        }
        groups.push(group);
    }

    Ok(groups)
}

/// Bucket updates by `(ecosystem, is_major)`, in ecosystem order with the
/// non-major bucket first.
pub fn default_groups(updates: Vec<CandidateUpdate>) -> Vec<UpdateGroup> {
    let mut buckets: BTreeMap<(Ecosystem, bool), Vec<CandidateUpdate>> = BTreeMap::new();
    for update in updates {
        buckets
            .entry((update.ecosystem, update.is_major()))
            .or_default()
            .push(update);
    }

    buckets
        .into_iter()
        .map(|((ecosystem, major), updates)| {
            UpdateGroup::new(default_group_name(ecosystem, major), updates)
        })
        .collect()
}

pub fn default_group_name(ecosystem: Ecosystem, major: bool) -> String {
    let severity = if major { "major" } else { "non-major" };
    format!("{ecosystem} {severity}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupRule;
    use crate::domain::UpdateType;

    fn npm(name: &str, from: &str, to: &str) -> CandidateUpdate {
        CandidateUpdate::new(name, from, to, Ecosystem::Npm, "package.json")
    }

    fn rule(name: &str, patterns: &[&str], types: Option<Vec<UpdateType>>) -> GroupRule {
        GroupRule {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            update_types: types,
        }
    }

    #[test]
    fn test_default_heuristic_splits_major() {
        let updates = vec![
            npm("a", "1.0.0", "1.1.0"),
            npm("b", "1.0.0", "2.0.0"),
            npm("c", "1.0.0", "1.0.1"),
            CandidateUpdate::new(
                "actions/checkout",
                "3",
                "4",
                Ecosystem::GithubActions,
                ".github/workflows/ci.yml",
            ),
        ];
        let groups = group_updates(&updates, &ReconciliationConfig::default()).unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["npm non-major", "npm major", "github-actions major"]
        );
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].update_type, UpdateType::Minor);
    }

    #[test]
    fn test_first_rule_wins() {
        let mut config = ReconciliationConfig::default();
        config.groups = vec![
            rule("react ecosystem", &["react*"], None),
            rule("everything react-dom", &["react-dom"], None),
        ];
        let updates = vec![npm("react", "18.0.0", "18.3.0"), npm("react-dom", "18.0.0", "18.3.0")];
        let groups = group_updates(&updates, &config).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "react ecosystem");
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_severity_filter_falls_through_to_default() {
        let mut config = ReconciliationConfig::default();
        config.groups = vec![rule("linters", &["eslint*"], Some(vec![UpdateType::Minor, UpdateType::Patch]))];
        let updates = vec![npm("eslint", "8.0.0", "9.0.0"), npm("eslint-plugin-x", "1.0.0", "1.1.0")];
        let groups = group_updates(&updates, &config).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "linters");
        assert_eq!(groups[0].updates[0].name, "eslint-plugin-x");
        assert_eq!(groups[1].name, "npm major");
    }

    #[test]
    fn test_colliding_rule_name_keeps_default_distinct() {
        let mut config = ReconciliationConfig::default();
        config.groups = vec![rule("npm non-major", &["a"], None)];
        let updates = vec![npm("a", "1.0.0", "1.1.0"), npm("b", "1.0.0", "1.1.0")];
        let groups = group_updates(&updates, &config).unwrap();
        assert_eq!(groups[0].name, "npm non-major");
        assert_eq!(groups[1].name, "npm non-major (default)");
    }

    #[test]
    fn test_rule_with_default_slug_gets_distinct_branch() {
        let mut config = ReconciliationConfig::default();
        config.groups = vec![rule("npm-non-major", &["react"], None)];
        let updates = vec![npm("react", "18.0.0", "18.3.0"), npm("vue", "3.3.0", "3.4.0")];
        let groups = group_updates(&updates, &config).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "npm-non-major");
        assert_eq!(groups[1].name, "npm non-major (default)");
        assert_ne!(slugify(&groups[0].name), slugify(&groups[1].name));
    }

    #[test]
    fn test_rules_sharing_a_slug_are_rejected() {
        let mut config = ReconciliationConfig::default();
        config.groups = vec![
            rule("React Ecosystem", &["react"], None),
            rule("react-ecosystem", &["react-dom"], None),
        ];
        let updates = vec![npm("react", "18.0.0", "18.3.0"), npm("react-dom", "18.0.0", "18.3.0")];
        let err = group_updates(&updates, &config).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        let groups = group_updates(&[], &ReconciliationConfig::default()).unwrap();
        assert!(groups.is_empty());
    }
}
