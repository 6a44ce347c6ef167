//! GitHub platform integration for depbot
//!
//! [`GitHubPlatform`] implements the engine's `Platform` trait: pull
//! requests, labels, reviewers and comments go through the REST API, while
//! commits are made in a local checkout and force-pushed.

pub mod client;
pub mod config;
pub mod platform;
pub mod wire;

pub use client::GitHubClient;
pub use config::{parse_repo, GitHubConfig};
pub use platform::GitHubPlatform;
