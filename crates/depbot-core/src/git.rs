//! Git-backed working tree.
//!
//! [`GitWorkspace`] shells out to `git` for everything that touches refs
//! and keeps file reads on the plain file system.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::{FileUpdate, WorkspaceError};
use crate::platform::Workspace;

/// Run `git` in `dir` and return trimmed stdout.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String, WorkspaceError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| WorkspaceError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkspaceError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// Capture the HEAD commit SHA of a repository.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String, WorkspaceError> {
    let sha = run_git(repo_dir, &["rev-parse", "HEAD"])?;
    if sha.is_empty() {
        return Err(WorkspaceError::Git(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct GitWorkspace {
    root: PathBuf,
    remote: String,
}

impl GitWorkspace {
    /// Open the work tree at `root`, using `origin` as the remote.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        if !is_git_repo(&root) {
            return Err(WorkspaceError::Git(format!(
                "{} is not a git work tree",
                root.display()
            )));
        }
        Ok(Self {
            root,
            remote: "origin".to_string(),
        })
    }

    pub fn with_remote(mut self, remote: &str) -> Self {
        self.remote = remote.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: &[&str]) -> Result<String, WorkspaceError> {
        run_git(&self.root, args)
    }

    fn has_rev(&self, rev: &str) -> bool {
        self.git(&["rev-parse", "--verify", "--quiet", &format!("{rev}^{{commit}}")])
            .is_ok()
    }

    /// Remote-tracking ref of `branch` if it exists, else the local branch.
    fn start_point(&self, branch: &str) -> String {
        let remote = format!("{}/{branch}", self.remote);
        if self.has_rev(&remote) {
            remote
        } else {
            branch.to_string()
        }
    }

    pub fn fetch(&self) -> Result<(), WorkspaceError> {
        self.git(&["fetch", "--prune", "--quiet", &self.remote])?;
        Ok(())
    }

    /// Check out `branch` freshly created from `base`, dropping local changes.
    pub fn recreate_branch(&self, branch: &str, base: &str) -> Result<(), WorkspaceError> {
        let start = self.start_point(base);
        self.git(&["checkout", "--quiet", "--force", "-B", branch, &start])?;
        Ok(())
    }

    pub fn write_files(&self, files: &[FileUpdate]) -> Result<(), WorkspaceError> {
        for file in files {
            let path = self.root.join(&file.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &file.content)?;
        }
        Ok(())
    }

    /// Stage `files` and commit them as `author` (`Name <email>`).
    pub fn commit(
        &self,
        files: &[FileUpdate],
        message: &str,
        author: &str,
    ) -> Result<String, WorkspaceError> {
        let mut add = vec!["add", "--"];
        add.extend(files.iter().map(|f| f.path.as_str()));
        self.git(&add)?;

        let (name, email) = split_author(author);
        let name_cfg = format!("user.name={name}");
        let email_cfg = format!("user.email={email}");
        self.git(&[
            "-c", &name_cfg, "-c", &email_cfg, "commit", "--quiet", "-m", message,
        ])?;
        capture_head_sha(&self.root)
    }

    pub fn push(&self, branch: &str, force: bool) -> Result<(), WorkspaceError> {
        let refspec = format!("{branch}:refs/heads/{branch}");
        let mut args = vec!["push", "--quiet"];
        if force {
            args.push("--force");
        }
        args.push(&self.remote);
        args.push(&refspec);
        self.git(&args)?;
        Ok(())
    }
}

fn split_author(author: &str) -> (&str, &str) {
    match author.split_once('<') {
        Some((name, rest)) => (name.trim(), rest.trim_end_matches('>').trim()),
        None => (author.trim(), "noreply@example.com"),
    }
}

impl Workspace for GitWorkspace {
    fn remote(&self) -> &str {
        &self.remote
    }

    fn file_exists(&self, path: &str) -> bool {
        self.root.join(path).is_file()
    }

    fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        Ok(std::fs::read_to_string(self.root.join(path))?)
    }

    fn show_file(&self, rev: &str, path: &str) -> Result<String, WorkspaceError> {
        let output = Command::new("git")
            .args(["show", &format!("{rev}:{path}")])
            .current_dir(&self.root)
            .output()
            .map_err(|e| WorkspaceError::Git(format!("failed to run git: {e}")))?;
        if !output.status.success() {
            return Err(WorkspaceError::MissingAtRev {
                rev: rev.to_string(),
                path: path.to_string(),
            });
        }
        // Raw stdout: content must compare byte for byte.
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn reset_to_base(&self, base: &str) -> Result<(), WorkspaceError> {
        let start = self.start_point(base);
        self.git(&["checkout", "--quiet", "--force", "-B", base, &start])?;
        self.git(&["reset", "--quiet", "--hard"])?;
        self.git(&["clean", "-fdq"])?;
        Ok(())
    }
}
