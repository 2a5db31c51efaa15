//! Remote origin error types
//!
//! Structured errors for GitHub contents API calls.
//! Maps HTTP status codes to specific variants so failures can be logged and counted.

/// Maximum length for response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Remote origin error types
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("Unauthorized, token missing or rejected: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Request(String),
}

impl OriginError {
    /// Create an OriginError from an HTTP status code and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = truncate_body(body);
        match status {
            401 => OriginError::Unauthorized(body),
            403 => OriginError::Forbidden(body),
            404 => OriginError::NotFound(body),
            409 | 422 => OriginError::Conflict(body),
            429 => OriginError::RateLimited,
            500..=599 => OriginError::Server(status, body),
            _ => OriginError::Request(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Short machine-readable label used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            OriginError::Unauthorized(_) => "unauthorized",
            OriginError::Forbidden(_) => "forbidden",
            OriginError::NotFound(_) => "not_found",
            OriginError::Conflict(_) => "conflict",
            OriginError::RateLimited => "rate_limited",
            OriginError::Server(_, _) => "server",
            OriginError::Network(_) => "network",
            OriginError::Request(_) => "request",
        }
    }
}

impl From<reqwest::Error> for OriginError {
    fn from(e: reqwest::Error) -> Self {
        OriginError::Network(e.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            OriginError::from_status(401, "Bad credentials"),
            OriginError::Unauthorized(_)
        ));
        assert!(matches!(
            OriginError::from_status(404, ""),
            OriginError::NotFound(_)
        ));
        assert!(matches!(
            OriginError::from_status(422, "sha wasn't supplied"),
            OriginError::Conflict(_)
        ));
        assert!(matches!(
            OriginError::from_status(429, ""),
            OriginError::RateLimited
        ));
        assert!(matches!(
            OriginError::from_status(502, "bad gateway"),
            OriginError::Server(502, _)
        ));
        assert_eq!(OriginError::from_status(418, "").kind(), "request");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(2000);
        let err = OriginError::from_status(500, &body);
        let msg = err.to_string();
        assert!(msg.len() < 700);
        assert!(msg.contains("2000 bytes total"));
    }
}
