//! Remote file origin (GitHub contents API)

pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;

pub use client::{GitHubClient, RepoTarget};
pub use errors::OriginError;
pub use types::{FailureEntry, OriginStatus, UploadReceipt};

/// Durable store for image bytes that the local cache mirrors
#[async_trait]
pub trait RemoteOrigin: Send + Sync {
    /// Commit `data` as `filename` in the configured target folder
    async fn upload(&self, filename: &str, data: &[u8]) -> Result<UploadReceipt, OriginError>;

    /// Download the bytes behind a previously returned fetch URL
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, OriginError>;

    /// Connectivity snapshot for operators
    fn status(&self) -> OriginStatus {
        OriginStatus::default()
    }
}
