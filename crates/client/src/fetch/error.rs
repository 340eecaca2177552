//! Fetch client error types.

use std::sync::Arc;

use snipcache_core::Error;

use super::url::UrlError;

/// Errors from the HTTP fetch client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] UrlError),

    /// The HTTP client could not be constructed.
    #[error("client setup failed: {0}")]
    Setup(String),

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout } else { FetchError::Network(Arc::new(err)) }
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(e) => Error::InvalidUrl(e.to_string()),
            other => Error::Network(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::TooLarge { size: 10, limit: 5 };
        assert!(err.to_string().contains("10 bytes exceeds 5"));
        assert_eq!(FetchError::Timeout.to_string(), "request timeout");
    }

    #[test]
    fn test_into_core_error() {
        let err: Error = FetchError::Timeout.into();
        assert!(err.is_network());

        let err: Error = FetchError::InvalidUrl(UrlError::Empty).into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
