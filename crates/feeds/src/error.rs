//! Error types for rate fetching.

use thiserror::Error;

/// Errors a single source can produce while fetching its rate.
///
/// These never leave the aggregator: a failing source becomes an absent
/// reading in the snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Rate not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to parse response: {0}")]
    ParseFailure(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::ParseFailure(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::ParseFailure(err.to_string())
    }
}

impl From<quick_xml::Error> for FetchError {
    fn from(err: quick_xml::Error) -> Self {
        FetchError::ParseFailure(err.to_string())
    }
}

impl From<regex::Error> for FetchError {
    fn from(err: regex::Error) -> Self {
        FetchError::ParseFailure(format!("invalid pattern: {}", err))
    }
}

impl FetchError {
    /// Returns true if the upstream may answer on a later round.
    /// `NotFound` and `ParseFailure` usually mean the page layout changed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout("30s".into()).is_transient());
        assert!(FetchError::Transport("HTTP 502".into()).is_transient());
        assert!(!FetchError::NotFound("referencia".into()).is_transient());
        assert!(!FetchError::ParseFailure("bad json".into()).is_transient());
    }

    #[test]
    fn test_serde_error_is_parse_failure() {
        let err: FetchError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, FetchError::ParseFailure(_)));
    }
}
