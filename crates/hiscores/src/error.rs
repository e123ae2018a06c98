use thiserror::Error;

/// Failure to read one page from the remote leaderboard.
///
/// An absent page is not an error; it is reported as
/// [`FetchOutcome::NotFound`](crate::FetchOutcome::NotFound).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("row for rank {rank} is missing field `{field}`")]
    MissingField { rank: u64, field: &'static str },
    #[error("other: {0}")]
    Other(String),
}

impl FetchError {
    /// Whether fetching the same page again may succeed.
    ///
    /// Network hiccups, throttling, server errors and truncated bodies are
    /// transient. A bad URL, a rejected request or a row schema mismatch
    /// fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidUrl(_) | Self::MissingField { .. } => false,
            Self::Transport(e) => is_retryable_reqwest_error(e),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::Other(_) => true,
        }
    }
}

/// Connect, timeout, request, body read and decode errors are retryable;
/// redirect and builder errors are not.
fn is_retryable_reqwest_error(e: &reqwest::Error) -> bool {
    if let Some(status) = e.status() {
        return status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
    }
    e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() || e.is_decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> FetchError {
        FetchError::Status {
            status,
            url: "https://example.com/overall.json".to_string(),
        }
    }

    #[test]
    fn test_server_errors_and_throttling_are_retryable() {
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!status(400).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!FetchError::InvalidUrl("not a url".to_string()).is_retryable());
        assert!(
            !FetchError::MissingField {
                rank: 1,
                field: "level"
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_truncated_body_is_retryable() {
        let err = serde_json::from_str::<Vec<u64>>("[1, 2").unwrap_err();
        assert!(FetchError::from(err).is_retryable());
        assert!(FetchError::Other("connection reset".to_string()).is_retryable());
    }
}
