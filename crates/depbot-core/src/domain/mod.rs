//! Domain types shared by every stage of a reconciliation pass.
//!
//! Nothing here outlives a pass: all values are recomputed from live platform
//! state and fresh scans on every run.

pub mod decision;
pub mod error;
pub mod group;
pub mod request;
pub mod update;

pub use decision::{CloseReason, Decision, ReconcileState, SkipReason};
pub use error::{
    ClassificationError, PlatformError, PlatformResult, ReconcileError, Result, WorkspaceError,
};
pub use group::UpdateGroup;
pub use request::{
    CreatedRequest, ExistingChangeRequest, MatchBasis, MatchResult, NewRequest, RequestState,
    RequestUpdate,
};
pub use update::{CandidateUpdate, Ecosystem, FileUpdate, UpdateType};
