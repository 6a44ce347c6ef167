//! Error taxonomy for the reconciliation engine.

/// A version string that could not be normalized into a comparable triple.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("version string is empty")]
    Empty,

    #[error("unparsable version component {component:?} in {version:?}")]
    InvalidComponent { version: String, component: String },
}

/// Errors returned by the hosting-platform collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("http error: {0}")]
    Http(String),

    #[error("platform API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("failed to decode platform response: {0}")]
    Decode(String),
}

/// Errors raised by the local working tree.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("git error: {0}")]
    Git(String),

    #[error("path not found at {rev}: {path}")]
    MissingAtRev { rev: String, path: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine-level errors.
///
/// Only [`ReconcileError::ListRequests`] aborts a pass; every other variant is
/// caught per group and recorded in the report.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to list open change requests: {0}")]
    ListRequests(#[source] PlatformError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("content generation failed for group '{group}': {reason}")]
    Generation { group: String, reason: String },

    #[error("branch '{branch}' is held by request #{number} which no group claimed")]
    BranchInUse { branch: String, number: u64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("scan failed for {ecosystem}: {reason}")]
    Scan { ecosystem: String, reason: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Result type for platform collaborator calls.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;
