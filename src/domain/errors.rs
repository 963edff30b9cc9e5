use thiserror::Error;

/// Failures talking to the statistics or search API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeedError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limit exceeded (HTTP 429)")]
    RateLimited,

    #[error("Unauthorized: upstream returned HTTP {0}")]
    Unauthorized(u16),

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl FeedError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FeedError::RateLimited,
            401 | 403 => FeedError::Unauthorized(status),
            500..=599 => FeedError::Transport(format!("server error HTTP {}", status)),
            _ => FeedError::Status(status),
        }
    }

    /// Whether the caller must give up on the whole report instead of
    /// treating the endpoint as empty.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return FeedError::from_status(status.as_u16());
        }
        if e.is_decode() {
            return FeedError::Malformed(e.to_string());
        }
        FeedError::Transport(e.to_string())
    }
}

pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(FeedError::from_status(429), FeedError::RateLimited);
        assert_eq!(FeedError::from_status(401), FeedError::Unauthorized(401));
        assert_eq!(FeedError::from_status(403), FeedError::Unauthorized(403));
        assert!(matches!(FeedError::from_status(502), FeedError::Transport(_)));
        assert_eq!(FeedError::from_status(404), FeedError::Status(404));
    }

    #[test]
    fn test_only_auth_failures_are_fatal() {
        assert!(FeedError::Unauthorized(401).is_fatal());
        assert!(!FeedError::RateLimited.is_fatal());
        assert!(!FeedError::Transport("timeout".to_string()).is_fatal());
        assert!(!FeedError::Malformed("not an array".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FeedError::Unauthorized(401).to_string(),
            "Unauthorized: upstream returned HTTP 401"
        );
        assert_eq!(FeedError::RateLimited.to_string(), "Rate limit exceeded (HTTP 429)");
    }
}
