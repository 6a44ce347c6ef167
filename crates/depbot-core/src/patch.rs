//! Default manifest patcher.
//!
//! [`TextPatcher`] edits manifests as text: on the first line that names the
//! package as a whole token, the current version string following the name is
//! replaced by the new one. Indentation, quoting, comments and range
//! operators stay exactly as they were, which keeps diffs minimal for every
//! supported manifest format (JSON, YAML, Dockerfile `FROM` lines, workflow
//! `uses:` lines).

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::{CandidateUpdate, Ecosystem, FileUpdate, ReconcileError};
use crate::platform::{FileGenerator, Workspace};
use crate::version;

#[derive(Debug, Default, Clone)]
pub struct TextPatcher {
    /// Restrict to these ecosystems; empty means all.
    ecosystems: Vec<Ecosystem>,
}

impl TextPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_ecosystems(ecosystems: &[Ecosystem]) -> Self {
        Self {
            ecosystems: ecosystems.to_vec(),
        }
    }
}

#[async_trait]
impl FileGenerator for TextPatcher {
    fn handles(&self, ecosystem: Ecosystem) -> bool {
        self.ecosystems.is_empty() || self.ecosystems.contains(&ecosystem)
    }

    async fn generate_file_updates(
        &self,
        updates: &[CandidateUpdate],
        workspace: &dyn Workspace,
    ) -> Result<Vec<FileUpdate>, ReconcileError> {
        let mut by_file: BTreeMap<&str, Vec<&CandidateUpdate>> = BTreeMap::new();
        for update in updates {
            by_file.entry(&update.source_file).or_default().push(update);
        }

        let mut files = Vec::new();
        for (path, updates) in by_file {
            let original = match workspace.read_file(path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "manifest unreadable, skipping");
                    continue;
                }
            };

            let mut content = original.clone();
            for update in updates {
                match patch_content(&content, update) {
                    Some(patched) => content = patched,
                    None => tracing::warn!(
                        path = %path,
                        package = %update.name,
                        version = %update.current_version,
                        "no line to patch"
                    ),
                }
            }

            if content != original {
                files.push(FileUpdate::new(path, content));
            }
        }
        Ok(files)
    }
}

/// Patch the first line naming `update.name` whose text after the name
/// contains the current version. Versions are tried as written, then with
/// range operators and `v` prefixes stripped (the manifest keeps its own).
pub fn patch_content(content: &str, update: &CandidateUpdate) -> Option<String> {
    let literal = (update.current_version.as_str(), update.new_version.as_str());
    let bare = (
        version::strip_prefix(&update.current_version),
        version::strip_prefix(&update.new_version),
    );
    replace_on_named_line(content, &update.name, literal)
        .or_else(|| replace_on_named_line(content, &update.name, bare))
}

fn replace_on_named_line(content: &str, name: &str, (from, to): (&str, &str)) -> Option<String> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if let Some(name_at) = find_token(line, name) {
            let after = name_at + name.len();
            if let Some(version_at) = find_version(&line[after..], from) {
                let start = offset + after + version_at;
                let mut patched = String::with_capacity(content.len() + to.len());
                patched.push_str(&content[..start]);
                patched.push_str(to);
                patched.push_str(&content[start + from.len()..]);
                return Some(patched);
            }
        }
        offset += line.len();
    }
    None
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '@')
}

/// Byte offset of `name` in `line` where it is not part of a longer name.
fn find_token(line: &str, name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    line.match_indices(name).map(|(at, _)| at).find(|&at| {
        let before = line[..at].chars().next_back();
        let after = line[at + name.len()..].chars().next();
        before.is_none_or(|c| !is_name_char(c))
            && after.is_none_or(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    })
}

/// Offset of `version` in `rest` not followed by further version characters.
fn find_version(rest: &str, version: &str) -> Option<usize> {
    if version.is_empty() {
        return None;
    }
    rest.match_indices(version).map(|(at, _)| at).find(|&at| {
        rest[at + version.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '.'))
    })
}
