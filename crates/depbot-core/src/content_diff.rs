//! Comparing generated file content against what a branch already holds.

use crate::domain::FileUpdate;
use crate::platform::Workspace;

/// Whether `file` differs from its content at `branch`.
///
/// The local ref is tried first, then `<remote>/<branch>`. When neither can be
/// read the file counts as different, so the caller recreates the branch
/// instead of silently skipping it.
pub fn file_differs(workspace: &dyn Workspace, file: &FileUpdate, branch: &str) -> bool {
    let remote = format!("{}/{branch}", workspace.remote());
    for rev in [branch, remote.as_str()] {
        match workspace.show_file(rev, &file.path) {
            Ok(existing) => return existing != file.content,
            Err(e) => tracing::debug!(rev = %rev, path = %file.path, error = %e, "ref lookup failed"),
        }
    }
    true
}

/// True on the first generated file whose content differs from `branch`.
pub fn has_differences(workspace: &dyn Workspace, files: &[FileUpdate], branch: &str) -> bool {
    files.iter().any(|f| file_differs(workspace, f, branch))
}

/// True when at least one generated file differs from the working tree.
pub fn differs_from_disk(workspace: &dyn Workspace, files: &[FileUpdate]) -> bool {
    files.iter().any(|f| {
        workspace
            .read_file(&f.path)
            .map_or(true, |current| current != f.content)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryWorkspace;

    const BRANCH: &str = "depbot/update-composer-non-major";

    fn composer(y: &str) -> String {
        format!("{{\n    \"require\": {{\n        \"x/x\": \"^1.0\",\n        \"y/y\": \"{y}\"\n    }}\n}}\n")
    }

    #[test]
    fn test_remote_tracking_ref_follows_workspace_remote() {
        let ws = MemoryWorkspace::new().with_remote("upstream");
        ws.set_rev_file(&format!("upstream/{BRANCH}"), "composer.json", &composer("^2.0"));
        ws.set_rev_file(&format!("origin/{BRANCH}"), "composer.json", &composer("^1.0"));

        let same = FileUpdate::new("composer.json", composer("^2.0"));
        assert!(!file_differs(&ws, &same, BRANCH));
    }

    #[test]
    fn test_changed_path_differs_untouched_path_does_not() {
        let ws = MemoryWorkspace::new();
        ws.set_rev_file(&format!("origin/{BRANCH}"), "composer.json", &composer("^2.0"));
        ws.set_rev_file(&format!("origin/{BRANCH}"), "web/package.json", "{}\n");

        let changed = FileUpdate::new("composer.json", composer("^2.1"));
        let untouched = FileUpdate::new("web/package.json", "{}\n");

        assert!(file_differs(&ws, &changed, BRANCH));
        assert!(!file_differs(&ws, &untouched, BRANCH));
        assert!(has_differences(&ws, &[untouched.clone(), changed], BRANCH));
        assert!(!has_differences(&ws, &[untouched], BRANCH));
    }

    #[test]
    fn test_local_ref_wins_over_remote() {
        let ws = MemoryWorkspace::new();
        ws.set_rev_file(BRANCH, "composer.json", &composer("^2.1"));
        ws.set_rev_file(&format!("origin/{BRANCH}"), "composer.json", &composer("^2.0"));
        let file = FileUpdate::new("composer.json", composer("^2.1"));
        assert!(!file_differs(&ws, &file, BRANCH));
    }

    #[test]
    fn test_unreadable_ref_counts_as_different() {
        let ws = MemoryWorkspace::new();
        let file = FileUpdate::new("composer.json", composer("^2.1"));
        assert!(has_differences(&ws, &[file], BRANCH));
    }

    #[test]
    fn test_differs_from_disk() {
        let ws = MemoryWorkspace::new();
        ws.write("package.json", "{}\n");
        assert!(!differs_from_disk(&ws, &[FileUpdate::new("package.json", "{}\n")]));
        assert!(differs_from_disk(&ws, &[FileUpdate::new("package.json", "{ }\n")]));
        assert!(differs_from_disk(&ws, &[FileUpdate::new("new.json", "{}\n")]));
        assert!(!differs_from_disk(&ws, &[]));
    }
}
