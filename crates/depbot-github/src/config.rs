//! GitHub connection settings.

use depbot_core::PlatformError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// REST API root, without a trailing slash.
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Commit author, `Name <email>`.
    pub commit_author: String,
}

impl GitHubConfig {
    /// Config for `owner/name`, with the token and API URL taken from
    /// `GITHUB_TOKEN` and `GITHUB_API_URL` when set.
    pub fn from_env(slug: &str) -> Result<Self, PlatformError> {
        let (owner, repo) = parse_repo(slug)?;
        Ok(Self {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            owner,
            repo,
            token: std::env::var("GITHUB_TOKEN").ok(),
            timeout_secs: 30,
            commit_author: "depbot <depbot@users.noreply.github.com>".to_string(),
        })
    }

    pub fn new(api_url: &str, slug: &str) -> Result<Self, PlatformError> {
        let (owner, repo) = parse_repo(slug)?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            owner,
            repo,
            token: None,
            timeout_secs: 30,
            commit_author: "depbot <depbot@users.noreply.github.com>".to_string(),
        })
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// `/repos/{owner}/{repo}` prefix for repository endpoints.
    pub fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}

/// Split `owner/name`.
pub fn parse_repo(slug: &str) -> Result<(String, String), PlatformError> {
    match slug.trim().split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(PlatformError::NotFound(format!(
            "repository must be owner/name, got {slug:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo() {
        assert_eq!(
            parse_repo("stevedores-org/depbot").unwrap(),
            ("stevedores-org".to_string(), "depbot".to_string())
        );
        assert!(parse_repo("depbot").is_err());
        assert!(parse_repo("/depbot").is_err());
        assert!(parse_repo("a/b/c").is_err());
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        let config = GitHubConfig::new("http://localhost:8080/", "o/r").unwrap();
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.repo_path(), "/repos/o/r");
    }
}
