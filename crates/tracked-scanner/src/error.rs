use std::time::Duration;
use thiserror::Error;
use tracked_core::TrackedError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("rate limited, retry after {}s", display_secs(.retry_after))]
    RateLimited { retry_after: Duration },

    #[error("API access forbidden (HTTP 403): {url}")]
    Forbidden { url: String },

    #[error("game not found (HTTP 404): {url}")]
    NotFound { url: String },

    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("malformed listing response: {0}")]
    MalformedResponse(String),

    #[error("scan cancelled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ScanError {
    /// Errors that must end the whole operation instead of one page.
    ///
    /// Everything else is a soft failure a paginating loop may absorb.
    #[must_use]
    pub fn halts_scan(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidInput(_)
                | ScanError::RateLimited { .. }
                | ScanError::Forbidden { .. }
                | ScanError::NotFound { .. }
                | ScanError::Cancelled
                | ScanError::HttpClient(_)
        )
    }
}

impl From<TrackedError> for ScanError {
    fn from(err: TrackedError) -> Self {
        ScanError::InvalidInput(err.to_string())
    }
}

/// Whole seconds a caller should wait, rounded up and never zero.
#[must_use]
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = retry_after.as_millis();
    let secs = millis.div_ceil(1000);
    u64::try_from(secs).unwrap_or(u64::MAX).max(1)
}

pub(crate) fn display_secs(retry_after: &Duration) -> u64 {
    retry_after_secs(*retry_after)
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScanError::RateLimited {
            retry_after: Duration::from_millis(14_200),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 15s");

        let err = ScanError::NotFound {
            url: "https://games.example/v1/games/1/servers/Public".to_string(),
        };
        assert!(err.to_string().starts_with("game not found (HTTP 404)"));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(15_000)), 15);
        assert_eq!(retry_after_secs(Duration::from_millis(15_001)), 16);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn test_halting_classification() {
        assert!(ScanError::Cancelled.halts_scan());
        assert!(ScanError::RateLimited {
            retry_after: Duration::from_secs(15)
        }
        .halts_scan());
        assert!(!ScanError::TransientNetwork("HTTP 502".to_string()).halts_scan());
        assert!(!ScanError::MalformedResponse("eof".to_string()).halts_scan());
        assert!(!ScanError::Timeout {
            timeout: Duration::from_secs(15)
        }
        .halts_scan());
    }

    #[test]
    fn test_from_validation_error() {
        let err: ScanError = TrackedError::Validation("bad place".to_string()).into();
        assert!(matches!(err, ScanError::InvalidInput(_)));
    }
}
