//! Remote Code-Forge Client (C3).
//!
//! Fetches repository tree, file blobs, and rate-limit state from a
//! GitHub-style REST API. Follows the connection-pooling and header setup
//! of the teacher's `github::client::GitHubClient`, trimmed to exactly the
//! three operations spec §6 grants the core: recursive tree fetch, content
//! fetch by path at a ref, and rate-limit query.

use crate::error::{CoreError, ForbiddenKind, RemoteError};
use crate::forge::models::{BlobResponse, RateLimitResponse, RepoResponse, TreeResponse};
use crate::governor::{RateLimitSource, RateLimitState};
pub use crate::forge::models::FileEntry;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, StatusCode,
};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct ForgeClientConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ForgeClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("codeforge-intel/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Client for the remote code-forge API. Authentication is via a bearer
/// token; absent a token the client operates unauthenticated (spec §6).
#[derive(Clone)]
pub struct ForgeClient {
    config: ForgeClientConfig,
    http: Client,
}

impl ForgeClient {
    pub fn new(config: ForgeClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn is_authenticated(&self) -> bool {
        self.config.token.is_some()
    }

    /// spec §4.3: recursive tree fetch with branch fallback
    /// (`main` -> `master` -> the repo's actual default branch).
    pub async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<FileEntry>, CoreError> {
        match self.get_tree_at_ref(owner, repo, reference).await {
            Ok(entries) => Ok(entries),
            Err(CoreError::Remote(RemoteError::NotFound(_))) if reference == "main" => {
                debug!(owner, repo, "ref 'main' not found, trying 'master'");
                match self.get_tree_at_ref(owner, repo, "master").await {
                    Ok(entries) => Ok(entries),
                    Err(CoreError::Remote(RemoteError::NotFound(_))) => {
                        let default_branch = self.get_default_branch(owner, repo).await?;
                        debug!(
                            owner,
                            repo,
                            default_branch,
                            "ref 'master' not found either, trying default branch"
                        );
                        self.get_tree_at_ref(owner, repo, &default_branch).await
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn get_tree_at_ref(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<FileEntry>, CoreError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/git/trees/{reference}?recursive=1",
            self.config.base_url
        );
        let response = self.send_get(&url).await?;
        let body: TreeResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Remote(RemoteError::Fatal(e.to_string())))?;
        if body.truncated {
            warn!(owner, repo, reference, "tree listing truncated by remote");
        }
        Ok(body.tree)
    }

    async fn get_default_branch(&self, owner: &str, repo: &str) -> Result<String, CoreError> {
        let url = format!("{}/repos/{owner}/{repo}", self.config.base_url);
        let response = self.send_get(&url).await?;
        let body: RepoResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Remote(RemoteError::Fatal(e.to_string())))?;
        Ok(body.default_branch)
    }

    /// spec §4.3: base64-decoded UTF-8 blob content. Binary/undecodable
    /// content returns empty text rather than raising.
    pub async fn get_blob(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<String, CoreError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/contents/{}?ref={}",
            self.config.base_url,
            urlencoding::encode(path),
            urlencoding::encode(reference),
        );
        let response = self.send_get(&url).await?;
        let body: BlobResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Remote(RemoteError::Fatal(e.to_string())))?;

        if body.encoding != "base64" {
            return Ok(body.content);
        }

        let cleaned: String = body.content.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = match base64::engine::general_purpose::STANDARD.decode(cleaned) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(owner, repo, path, "failed to base64-decode blob: {e}");
                return Ok(String::new());
            }
        };

        Ok(String::from_utf8(decoded).unwrap_or_default())
    }

    /// spec §4.3: rate-limit query.
    pub async fn get_rate_limit(&self) -> Result<RateLimitState, CoreError> {
        let url = format!("{}/rate_limit", self.config.base_url);
        let response = self.send_get(&url).await?;
        let body: RateLimitResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Remote(RemoteError::Fatal(e.to_string())))?;
        let reset_at = DateTime::<Utc>::from_timestamp(body.rate.reset, 0).unwrap_or_else(Utc::now);
        Ok(RateLimitState {
            remaining: body.rate.remaining,
            reset_at,
        })
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, CoreError> {
        debug!("GET {url}");
        let response = tokio::time::timeout(self.config.timeout, self.http.get(url).send())
            .await
            .map_err(|_| CoreError::Timeout(self.config.timeout))?
            .map_err(|e| CoreError::Remote(RemoteError::Transient(e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(self.classify_error(status, response).await)
    }

    async fn classify_error(&self, status: StatusCode, response: reqwest::Response) -> CoreError {
        match status {
            StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                CoreError::Remote(RemoteError::NotFound(body))
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let is_quota = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|remaining| remaining == 0)
                    .unwrap_or(status == StatusCode::TOO_MANY_REQUESTS);

                let reset_at = response
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

                let remaining = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok());

                let body = response.text().await.unwrap_or_default();
                CoreError::Remote(RemoteError::Forbidden {
                    kind: if is_quota {
                        ForbiddenKind::Quota
                    } else {
                        ForbiddenKind::Access
                    },
                    message: body,
                    remaining,
                    reset_at,
                })
            }
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                CoreError::Remote(RemoteError::Transient(format!("HTTP {s}: {body}")))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                CoreError::Remote(RemoteError::Fatal(format!("HTTP {s}: {body}")))
            }
        }
    }
}

#[async_trait::async_trait]
impl RateLimitSource for ForgeClient {
    async fn fetch_rate_limit(&self) -> anyhow::Result<RateLimitState> {
        self.get_rate_limit().await.map_err(|e| anyhow::anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_unauthenticated() {
        let cfg = ForgeClientConfig::default();
        assert!(cfg.token.is_none());
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn client_builds_with_and_without_token() {
        assert!(ForgeClient::new(ForgeClientConfig::default()).is_ok());
        let with_token = ForgeClientConfig {
            token: Some("ghp_test".into()),
            ..Default::default()
        };
        let client = ForgeClient::new(with_token).unwrap();
        assert!(client.is_authenticated());
    }
}
