//! depbot core: the Update Reconciliation Engine
//!
//! Turns a set of candidate dependency updates into a minimal set of
//! change-request operations: one request per group, kept idempotent across
//! passes, with obsolete requests closed.
//!
//! ## Key Components
//!
//! - `version`: classifying and ordering version strings
//! - `grouping`: partitioning candidates into named groups
//! - `matcher`: finding the open request that already represents a group
//! - `auto_close`: deciding when a matched request is obsolete
//! - `content_diff`: comparing generated content against a branch
//! - `reconcile`: the per-group state machine driving all of the above
//!
//! Collaborators (hosting platform, working tree, generators, renderer) are
//! traits in [`platform`]; in-memory fakes live in [`fakes`].

pub mod auto_close;
pub mod body;
pub mod config;
pub mod content_diff;
pub mod domain;
pub mod dry_run;
pub mod fakes;
pub mod git;
pub mod grouping;
pub mod matcher;
pub mod obs;
pub mod patch;
pub mod pattern;
pub mod platform;
pub mod reconcile;
pub mod render;
pub mod report;
pub mod scan;
pub mod telemetry;
pub mod version;

pub use auto_close::{should_close, AutoCloseEvaluator};
pub use config::{BotIdentity, GroupRule, ReconciliationConfig};
pub use content_diff::has_differences;
pub use domain::{
    CandidateUpdate, ClassificationError, CloseReason, CreatedRequest, Decision, Ecosystem,
    ExistingChangeRequest, FileUpdate, MatchBasis, MatchResult, NewRequest, PlatformError,
    PlatformResult, ReconcileError, ReconcileState, RequestState, RequestUpdate, Result,
    SkipReason, UpdateGroup, UpdateType, WorkspaceError,
};
pub use dry_run::DryRunPlatform;
pub use git::{capture_head_sha, is_git_repo, GitWorkspace};
pub use grouping::group_updates;
pub use matcher::{branch_name, find_match, PrMatcher};
pub use patch::TextPatcher;
pub use platform::{FileGenerator, Platform, Renderer, Workspace};
pub use reconcile::{admit, payload_digest, Reconciler};
pub use render::DefaultRenderer;
pub use report::{GroupReport, ReconciliationReport};
pub use scan::{collect_candidates, DependencySource, JsonFileSource};
pub use version::{classify, is_upgrade};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
