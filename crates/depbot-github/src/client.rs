//! Thin GitHub REST client.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use depbot_core::{PlatformError, PlatformResult};

use crate::config::GitHubConfig;
use crate::wire::{
    ApiErrorBody, Assignees, Comment, CreatePull, CreateRef, GitRef, Labels, PullRequest,
    Reviewers, UpdatePull,
};

const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";

pub struct GitHubClient {
    config: GitHubConfig,
    http: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> PlatformResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| PlatformError::Http(format!("invalid token header: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("depbot/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlatformError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", self.config.api_url, self.config.repo_path(), path);
        debug!(method = %method, url = %url, "github request");
        self.http.request(method, url)
    }

    async fn send(&self, builder: RequestBuilder) -> PlatformResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::Http(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &url, &body))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PlatformResult<T> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    async fn send_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> PlatformResult<Response> {
        self.send(self.request(method, path).json(body)).await
    }

    /// Every open pull request, following pagination.
    pub async fn list_open_pulls(&self) -> PlatformResult<Vec<PullRequest>> {
        let mut pulls = Vec::new();
        for page in 1.. {
            let batch: Vec<PullRequest> = self
                .json(self.request(Method::GET, "/pulls").query(&[
                    ("state", "open".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ]))
                .await?;
            let last = batch.len() < PER_PAGE;
            pulls.extend(batch);
            if last {
                break;
            }
        }
        Ok(pulls)
    }

    /// Head SHA of `branch`, `None` if it does not exist.
    pub async fn branch_sha(&self, branch: &str) -> PlatformResult<Option<String>> {
        match self
            .json::<GitRef>(self.request(Method::GET, &format!("/git/ref/heads/{branch}")))
            .await
        {
            Ok(git_ref) => Ok(Some(git_ref.object.sha)),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_ref(&self, branch: &str, sha: &str) -> PlatformResult<()> {
        let body = CreateRef {
            ref_name: format!("refs/heads/{branch}"),
            sha,
        };
        self.send_body(Method::POST, "/git/refs", &body).await?;
        Ok(())
    }

    pub async fn delete_ref(&self, branch: &str) -> PlatformResult<()> {
        self.send(self.request(Method::DELETE, &format!("/git/refs/heads/{branch}")))
            .await?;
        Ok(())
    }

    pub async fn create_pull(&self, body: &CreatePull<'_>) -> PlatformResult<PullRequest> {
        self.json(self.request(Method::POST, "/pulls").json(body)).await
    }

    pub async fn update_pull(&self, number: u64, body: &UpdatePull<'_>) -> PlatformResult<()> {
        self.send_body(Method::PATCH, &format!("/pulls/{number}"), body)
            .await?;
        Ok(())
    }

    /// Replace every label on an issue or pull request.
    pub async fn set_labels(&self, number: u64, labels: &[String]) -> PlatformResult<()> {
        self.send_body(Method::PUT, &format!("/issues/{number}/labels"), &Labels { labels })
            .await?;
        Ok(())
    }

    pub async fn add_labels(&self, number: u64, labels: &[String]) -> PlatformResult<()> {
        self.send_body(Method::POST, &format!("/issues/{number}/labels"), &Labels { labels })
            .await?;
        Ok(())
    }

    pub async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> PlatformResult<()> {
        self.send_body(
            Method::POST,
            &format!("/pulls/{number}/requested_reviewers"),
            &Reviewers { reviewers },
        )
        .await?;
        Ok(())
    }

    pub async fn add_assignees(&self, number: u64, assignees: &[String]) -> PlatformResult<()> {
        self.send_body(
            Method::POST,
            &format!("/issues/{number}/assignees"),
            &Assignees { assignees },
        )
        .await?;
        Ok(())
    }

    pub async fn create_comment(&self, number: u64, body: &str) -> PlatformResult<()> {
        self.send_body(
            Method::POST,
            &format!("/issues/{number}/comments"),
            &Comment { body },
        )
        .await?;
        Ok(())
    }
}

/// Map a non-success response to a [`PlatformError`].
pub fn error_for_status(status: StatusCode, path: &str, body: &str) -> PlatformError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    if status == StatusCode::NOT_FOUND {
        return PlatformError::NotFound(path.to_string());
    }
    PlatformError::Api {
        status: status.as_u16(),
        message,
    }
}
