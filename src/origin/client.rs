//! GitHub contents API client
//!
//! Mirrors cached images into a fixed repository folder and fetches them back
//! by download URL. Every call is single-shot: failures are logged, recorded in
//! a short history for `/health`, and handed back to the caller, which treats
//! them as non-fatal.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::OriginError;
use super::types::{
    ContentEntry, FailureEntry, OriginStatus, PutContentsRequest, PutContentsResponse,
    UploadReceipt,
};
use super::RemoteOrigin;

/// GitHub REST API root
const GITHUB_API_URL: &str = "https://api.github.com";

/// HTTP client timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of recent failures to keep
const MAX_FAILURE_HISTORY: usize = 10;

/// Health status values
const HEALTH_HEALTHY: u8 = 0;
const HEALTH_DEGRADED: u8 = 1;
const HEALTH_UNHEALTHY: u8 = 2;

/// Repository location uploads are committed to
#[derive(Debug, Clone)]
pub struct RepoTarget {
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    /// Folder inside the repository, without leading or trailing slash
    pub folder: String,
}

/// GitHub client for the image mirror
pub struct GitHubClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Where uploads land
    target: RepoTarget,
    /// Connection health (0=healthy, 1=degraded, 2=unhealthy)
    health: AtomicU8,
    /// Recent failure log
    failures: RwLock<VecDeque<FailureEntry>>,
}

impl GitHubClient {
    /// Build a client for the given repository target
    ///
    /// # Arguments
    /// * `token` - Personal access token; without one every upload is rejected by GitHub
    /// * `target` - Repository, branch and folder to commit into
    pub fn new(token: Option<&str>, target: RepoTarget) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        match token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("token {}", token))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!("No GitHub token configured, image uploads will be rejected"),
        }

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        info!(
            repo = %target.repo,
            branch = %target.branch,
            folder = %target.folder,
            "GitHub client ready"
        );

        Ok(Self {
            http_client,
            target,
            health: AtomicU8::new(HEALTH_HEALTHY),
            failures: RwLock::new(VecDeque::with_capacity(MAX_FAILURE_HISTORY)),
        })
    }

    /// Contents API URL for a file in the target folder
    fn contents_url(&self, filename: &str) -> String {
        let folder = self.target.folder.trim_matches('/');
        if folder.is_empty() {
            format!("{}/repos/{}/contents/{}", GITHUB_API_URL, self.target.repo, filename)
        } else {
            format!(
                "{}/repos/{}/contents/{}/{}",
                GITHUB_API_URL, self.target.repo, folder, filename
            )
        }
    }

    /// Blob SHA of an existing file, needed to overwrite it
    async fn existing_sha(&self, url: &str) -> Option<String> {
        let response = self
            .http_client
            .get(url)
            .query(&[("ref", self.target.branch.as_str())])
            .send()
            .await
            .ok()?;

        if response.status() != StatusCode::OK {
            return None;
        }

        let entry: ContentEntry = response.json().await.ok()?;
        debug!(path = %entry.path, sha = %entry.sha, "Found existing file on origin");
        Some(entry.sha)
    }

    async fn try_upload(&self, filename: &str, data: &[u8]) -> Result<UploadReceipt, OriginError> {
        let url = self.contents_url(filename);
        let sha = self.existing_sha(&url).await;

        let request = PutContentsRequest {
            message: format!("Upload {}", filename),
            content: base64::engine::general_purpose::STANDARD.encode(data),
            branch: self.target.branch.clone(),
            sha,
        };

        info!(
            file = filename,
            size = data.len(),
            replace = request.sha.is_some(),
            "Uploading image to GitHub"
        );

        let response = self.http_client.put(&url).json(&request).send().await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(OriginError::from_status(status.as_u16(), &body));
        }

        // A 2xx with an unexpected body still counts as uploaded
        let download_url = match response.json::<PutContentsResponse>().await {
            Ok(body) => body.content.and_then(|c| c.download_url),
            Err(e) => {
                debug!(file = filename, error = %e, "Upload response had no content entry");
                None
            }
        };

        info!(file = filename, download_url = ?download_url, "Image uploaded to GitHub");
        Ok(UploadReceipt { download_url })
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<u8>, OriginError> {
        debug!(url = url, "Fetching image from origin");

        let response = self.raw_download(self.http_client.get(url)).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(OriginError::from_status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        info!(url = url, size = bytes.len(), "Fetched image from origin");
        Ok(bytes.to_vec())
    }

    /// Download URLs serve raw bytes, not API JSON
    fn raw_download(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(ACCEPT, "*/*")
    }

    fn record_success(&self) {
        self.health.store(HEALTH_HEALTHY, Ordering::Relaxed);
    }

    /// Log a failure and push it onto the history ring buffer
    fn record_failure(&self, operation: &str, target: &str, error: &OriginError) {
        warn!(
            operation = operation,
            target = target,
            kind = error.kind(),
            error = %error,
            "Origin call failed"
        );

        let level = match error {
            OriginError::Network(_) => HEALTH_UNHEALTHY,
            _ => HEALTH_DEGRADED,
        };
        self.health.store(level, Ordering::Relaxed);

        let entry = FailureEntry {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            operation: operation.to_string(),
            target: target.to_string(),
            error: error.to_string(),
        };

        if let Ok(mut log) = self.failures.write() {
            if log.len() >= MAX_FAILURE_HISTORY {
                log.pop_front();
            }
            log.push_back(entry);
        }
    }

    /// Get connection health status string
    pub fn health_status(&self) -> &'static str {
        match self.health.load(Ordering::Relaxed) {
            HEALTH_HEALTHY => "healthy",
            HEALTH_DEGRADED => "degraded",
            _ => "unhealthy",
        }
    }

    /// Get recent failures, oldest first
    pub fn recent_failures(&self) -> Vec<FailureEntry> {
        self.failures
            .read()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteOrigin for GitHubClient {
    async fn upload(&self, filename: &str, data: &[u8]) -> Result<UploadReceipt, OriginError> {
        match self.try_upload(filename, data).await {
            Ok(receipt) => {
                self.record_success();
                Ok(receipt)
            }
            Err(e) => {
                self.record_failure("upload", filename, &e);
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, OriginError> {
        match self.try_fetch(url).await {
            Ok(bytes) => {
                self.record_success();
                Ok(bytes)
            }
            Err(e) => {
                self.record_failure("fetch", url, &e);
                Err(e)
            }
        }
    }

    fn status(&self) -> OriginStatus {
        OriginStatus {
            health: self.health_status(),
            recent_failures: self.recent_failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(folder: &str) -> GitHubClient {
        GitHubClient::new(
            Some("ghp_test"),
            RepoTarget {
                repo: "fasthoster/test".to_string(),
                branch: "main".to_string(),
                folder: folder.to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_contents_url() {
        let client = test_client("up");
        assert_eq!(
            client.contents_url("abc.png"),
            "https://api.github.com/repos/fasthoster/test/contents/up/abc.png"
        );

        let client = test_client("/");
        assert_eq!(
            client.contents_url("abc.png"),
            "https://api.github.com/repos/fasthoster/test/contents/abc.png"
        );
    }

    #[test]
    fn test_failure_history_is_bounded() {
        let client = test_client("up");
        assert_eq!(client.health_status(), "healthy");

        for i in 0..(MAX_FAILURE_HISTORY + 3) {
            client.record_failure(
                "upload",
                &format!("{}.png", i),
                &OriginError::from_status(500, "boom"),
            );
        }

        let failures = client.recent_failures();
        assert_eq!(failures.len(), MAX_FAILURE_HISTORY);
        assert_eq!(failures[0].target, "3.png");
        assert_eq!(client.health_status(), "degraded");

        client.record_failure("fetch", "https://x", &OriginError::Network("refused".into()));
        assert_eq!(client.health_status(), "unhealthy");

        client.record_success();
        assert_eq!(client.status().health, "healthy");
    }
}
