//! GitHub contents API types
//!
//! Request and response bodies for the create-or-update-file endpoint.

use serde::{Deserialize, Serialize};

/// Request body for `PUT /repos/{repo}/contents/{path}`
#[derive(Debug, Serialize)]
pub struct PutContentsRequest {
    /// Commit message
    pub message: String,
    /// Base64-encoded file content
    pub content: String,
    /// Target branch
    pub branch: String,
    /// Blob SHA of the file being replaced (required by GitHub for updates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// File entry returned by the contents API
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    /// File name (last path component)
    pub name: String,
    /// Path within the repository
    pub path: String,
    /// Blob SHA
    pub sha: String,
    /// Raw download URL (null for directories and submodules)
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Response from a successful create-or-update
#[derive(Debug, Deserialize)]
pub struct PutContentsResponse {
    /// The written file entry
    pub content: Option<ContentEntry>,
}

/// Result of a successful upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Stable fetch URL for the uploaded bytes, when the origin reported one
    pub download_url: Option<String>,
}

/// A recent origin failure, kept for operators
#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    /// "upload" or "fetch"
    pub operation: String,
    /// File name or URL the call targeted
    pub target: String,
    pub error: String,
}

/// Snapshot of origin connectivity
#[derive(Debug, Clone, Serialize)]
pub struct OriginStatus {
    /// "healthy", "degraded" or "unhealthy"
    pub health: &'static str,
    pub recent_failures: Vec<FailureEntry>,
}

impl Default for OriginStatus {
    fn default() -> Self {
        Self {
            health: "healthy",
            recent_failures: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_request_omits_missing_sha() {
        let request = PutContentsRequest {
            message: "Upload abc.png".to_string(),
            content: "aGVsbG8=".to_string(),
            branch: "main".to_string(),
            sha: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"branch\":\"main\""));
        assert!(!json.contains("sha"));
    }

    #[test]
    fn test_deserialize_put_response() {
        // Trimmed from a real create-file response; commit metadata is ignored
        let json = r#"{
            "content": {
                "name": "abc.png",
                "path": "up/abc.png",
                "sha": "95b966ae1c166bd92f8ae7d1c313e738c731dfc3",
                "size": 9,
                "url": "https://api.github.com/repos/fasthoster/test/contents/up/abc.png",
                "download_url": "https://raw.githubusercontent.com/fasthoster/test/main/up/abc.png",
                "type": "file"
            },
            "commit": {
                "sha": "7638417db6d59f3c431d3e1f261cc637155684cd",
                "message": "Upload abc.png"
            }
        }"#;
        let resp: PutContentsResponse = serde_json::from_str(json).unwrap();
        let content = resp.content.unwrap();
        assert_eq!(content.path, "up/abc.png");
        assert_eq!(
            content.download_url.as_deref(),
            Some("https://raw.githubusercontent.com/fasthoster/test/main/up/abc.png")
        );
    }

    #[test]
    fn test_deserialize_entry_without_download_url() {
        let json = r#"{"name":"up","path":"up","sha":"abc","download_url":null}"#;
        let entry: ContentEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name, "up");
        assert!(entry.download_url.is_none());
    }
}
