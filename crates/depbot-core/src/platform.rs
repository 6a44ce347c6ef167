//! Collaborator interfaces consumed by the engine.
//!
//! - [`Platform`]: the code-hosting platform (requests, branches, commits)
//! - [`Workspace`]: the local checkout the engine reads manifests from
//! - [`FileGenerator`]: per-ecosystem manifest patching
//! - [`Renderer`]: request title/body/label rendering
//!
//! In-memory implementations live in [`crate::fakes`].

use async_trait::async_trait;

use crate::domain::{
    CandidateUpdate, CreatedRequest, Ecosystem, ExistingChangeRequest, FileUpdate, NewRequest,
    PlatformResult, ReconcileError, RequestUpdate, UpdateGroup, WorkspaceError,
};

/// Hosting-platform operations. Every call is fallible; timeouts and
/// cancellation are the implementation's responsibility.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn list_open_requests(&self) -> PlatformResult<Vec<ExistingChangeRequest>>;

    async fn create_branch(&self, name: &str, base: &str) -> PlatformResult<()>;

    async fn branch_exists(&self, name: &str) -> PlatformResult<bool>;

    async fn delete_branch(&self, name: &str) -> PlatformResult<()>;

    /// Recreate `branch` from `base` and apply `files` as a single commit.
    async fn commit_changes(
        &self,
        branch: &str,
        message: &str,
        files: &[FileUpdate],
        base: &str,
    ) -> PlatformResult<()>;

    async fn create_request(&self, request: &NewRequest) -> PlatformResult<CreatedRequest>;

    async fn update_request(&self, number: u64, update: &RequestUpdate) -> PlatformResult<()>;

    async fn close_request(&self, number: u64) -> PlatformResult<()>;

    async fn add_comment(&self, number: u64, text: &str) -> PlatformResult<()>;
}

/// The local working tree. Paths are relative to the repository root.
pub trait Workspace: Send + Sync {
    fn file_exists(&self, path: &str) -> bool;

    fn read_file(&self, path: &str) -> Result<String, WorkspaceError>;

    /// Content of `path` at a git revision (branch, remote-tracking ref, sha).
    fn show_file(&self, rev: &str, path: &str) -> Result<String, WorkspaceError>;

    /// Discard local modifications and return to a clean `base`.
    fn reset_to_base(&self, base: &str) -> Result<(), WorkspaceError>;

    /// Remote whose tracking refs (`<remote>/<branch>`) mirror the platform.
    fn remote(&self) -> &str {
        "origin"
    }
}

/// Produces new manifest contents for a set of updates.
#[async_trait]
pub trait FileGenerator: Send + Sync {
    fn handles(&self, ecosystem: Ecosystem) -> bool;

    async fn generate_file_updates(
        &self,
        updates: &[CandidateUpdate],
        workspace: &dyn Workspace,
    ) -> Result<Vec<FileUpdate>, ReconcileError>;
}

/// Renders the human-facing parts of a request.
pub trait Renderer: Send + Sync {
    fn render_title(&self, group: &UpdateGroup) -> String;

    fn render_body(&self, group: &UpdateGroup) -> String;

    fn render_labels(&self, group: &UpdateGroup) -> Vec<String>;
}
