//! Default request rendering.
//!
//! Titles follow conventional-commit style so the matcher's similarity
//! heuristics recognise them on later passes. Bodies carry a markdown table
//! for humans and the hidden update marker (see [`crate::body`]) for the
//! engine.

use std::collections::BTreeSet;

use crate::body::encode_marker;
use crate::domain::{Ecosystem, UpdateGroup, UpdateType};
use crate::grouping::default_group_name;
use crate::platform::Renderer;
use crate::version;

pub const DEPENDENCIES_LABEL: &str = "dependencies";
pub const MAJOR_LABEL: &str = "major";

#[derive(Debug, Clone)]
pub struct DefaultRenderer {
    /// Conventional-commit prefix, e.g. `chore(deps)`.
    pub prefix: String,
}

impl Default for DefaultRenderer {
    fn default() -> Self {
        Self {
            prefix: "chore(deps)".to_string(),
        }
    }
}

fn is_default_name(group: &UpdateGroup) -> bool {
    let base = group.name.trim_end_matches(" (default)");
    Ecosystem::ALL.iter().any(|eco| {
        base == default_group_name(*eco, true) || base == default_group_name(*eco, false)
    })
}

impl Renderer for DefaultRenderer {
    fn render_title(&self, group: &UpdateGroup) -> String {
        let ecosystems = group.ecosystems();
        let major = group.update_type == UpdateType::Major;
        let only = |eco: Ecosystem| ecosystems.len() == 1 && ecosystems.contains(&eco);
        let severity = if major { " (major)" } else { "" };

        if only(Ecosystem::GithubActions) {
            return format!("{}: update github actions{severity}", self.prefix);
        }
        if only(Ecosystem::Docker) {
            return format!("{}: update docker images{severity}", self.prefix);
        }
        if let [single] = group.updates.as_slice() {
            return format!(
                "{}: update dependency {} to v{}",
                self.prefix,
                single.name,
                version::strip_prefix(&single.new_version)
            );
        }
        if !is_default_name(group) {
            return format!(
                "{}: update {} ({})",
                self.prefix, group.name, group.update_type
            );
        }
        match ecosystems.iter().next() {
            Some(eco) if ecosystems.len() == 1 => format!(
                "{}: update {} {} dependencies ({})",
                self.prefix,
                group.len(),
                eco,
                group.update_type
            ),
            _ => format!(
                "{}: update {} dependencies ({})",
                self.prefix,
                group.len(),
                group.update_type
            ),
        }
    }

    fn render_body(&self, group: &UpdateGroup) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "This request updates {} {} in group **{}**.\n\n",
            group.len(),
            if group.len() == 1 { "dependency" } else { "dependencies" },
            group.name
        ));
        out.push_str("| Package | Change | Type | File |\n");
        out.push_str("|---|---|---|---|\n");
        for u in &group.updates {
            out.push_str(&format!(
                "| `{}` | `{}` -> `{}` | {} | `{}` |\n",
                u.name, u.current_version, u.new_version, u.update_type, u.source_file
            ));
        }
        if group.update_type == UpdateType::Major {
            out.push_str("\n> This group contains major updates. Review breaking changes before merging.\n");
        }
        out.push('\n');
        out.push_str(&encode_marker(&group.updates));
        out.push('\n');
        out
    }

    fn render_labels(&self, group: &UpdateGroup) -> Vec<String> {
        let mut labels: BTreeSet<String> = BTreeSet::new();
        labels.insert(DEPENDENCIES_LABEL.to_string());
        for eco in group.ecosystems() {
            labels.insert(eco.as_str().to_string());
        }
        if group.update_type == UpdateType::Major {
            labels.insert(MAJOR_LABEL.to_string());
        }
        labels.into_iter().collect()
    }
}
