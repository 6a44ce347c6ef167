//! `Platform` implementation backed by GitHub and a local checkout.

use async_trait::async_trait;
use tracing::{info, warn};

use depbot_core::{
    CreatedRequest, ExistingChangeRequest, FileUpdate, GitWorkspace, NewRequest, Platform,
    PlatformError, PlatformResult, RequestUpdate, Workspace,
};

use crate::client::GitHubClient;
use crate::wire::{CreatePull, UpdatePull};

pub struct GitHubPlatform {
    client: GitHubClient,
    checkout: GitWorkspace,
}

impl GitHubPlatform {
    /// `checkout` is the clone commits are made in; its remote must point at
    /// the same repository as `client`.
    pub fn new(client: GitHubClient, checkout: GitWorkspace) -> Self {
        Self { client, checkout }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }
}

fn git_error(e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Git(e.to_string())
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn list_open_requests(&self) -> PlatformResult<Vec<ExistingChangeRequest>> {
        let pulls = self.client.list_open_pulls().await?;
        Ok(pulls.into_iter().map(ExistingChangeRequest::from).collect())
    }

    async fn create_branch(&self, name: &str, base: &str) -> PlatformResult<()> {
        let sha = self
            .client
            .branch_sha(base)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("base branch {base}")))?;
        self.client.create_ref(name, &sha).await
    }

    async fn branch_exists(&self, name: &str) -> PlatformResult<bool> {
        Ok(self.client.branch_sha(name).await?.is_some())
    }

    async fn delete_branch(&self, name: &str) -> PlatformResult<()> {
        self.client.delete_ref(name).await
    }

    async fn commit_changes(
        &self,
        branch: &str,
        message: &str,
        files: &[FileUpdate],
        base: &str,
    ) -> PlatformResult<()> {
        let author = &self.client.config().commit_author;
        self.checkout.fetch().map_err(git_error)?;
        self.checkout
            .recreate_branch(branch, base)
            .map_err(git_error)?;
        self.checkout.write_files(files).map_err(git_error)?;
        let sha = self
            .checkout
            .commit(files, message, author)
            .map_err(git_error)?;
        self.checkout.push(branch, true).map_err(git_error)?;
        info!(branch = %branch, sha = %sha, files = files.len(), "pushed update commit");

        if let Err(e) = self.checkout.reset_to_base(base) {
            warn!(base = %base, error = %e, "failed to return checkout to base");
        }
        Ok(())
    }

    async fn create_request(&self, request: &NewRequest) -> PlatformResult<CreatedRequest> {
        let pull = self
            .client
            .create_pull(&CreatePull {
                title: &request.title,
                body: &request.body,
                head: &request.head,
                base: &request.base,
            })
            .await?;
        let number = pull.number;

        // The pull request exists at this point; decorations are best-effort.
        if !request.labels.is_empty() {
            if let Err(e) = self.client.add_labels(number, &request.labels).await {
                warn!(number, error = %e, "failed to add labels");
            }
        }
        if !request.reviewers.is_empty() {
            if let Err(e) = self.client.request_reviewers(number, &request.reviewers).await {
                warn!(number, error = %e, "failed to request reviewers");
            }
        }
        if !request.assignees.is_empty() {
            if let Err(e) = self.client.add_assignees(number, &request.assignees).await {
                warn!(number, error = %e, "failed to add assignees");
            }
        }

        Ok(CreatedRequest {
            number,
            url: pull.html_url,
        })
    }

    async fn update_request(&self, number: u64, update: &RequestUpdate) -> PlatformResult<()> {
        self.client
            .update_pull(
                number,
                &UpdatePull {
                    title: Some(&update.title),
                    body: Some(&update.body),
                    state: None,
                },
            )
            .await?;
        self.client.set_labels(number, &update.labels).await
    }

    async fn close_request(&self, number: u64) -> PlatformResult<()> {
        self.client
            .update_pull(
                number,
                &UpdatePull {
                    state: Some("closed"),
                    ..UpdatePull::default()
                },
            )
            .await
    }

    async fn add_comment(&self, number: u64, text: &str) -> PlatformResult<()> {
        self.client.create_comment(number, text).await
    }
}
