//! Provider error types.

use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when calling an external provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error calling {provider}: {message}")]
    Network { provider: String, message: String },

    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} response could not be decoded: {message}")]
    Decode { provider: String, message: String },

    #[error("{provider} found no result for query: {query}")]
    NoResult { provider: String, query: String },

    #[error("Job submission rejected by {provider}: {message}")]
    SubmissionRejected { provider: String, message: String },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn http(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn decode(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn no_result(provider: impl Into<String>, query: impl Into<String>) -> Self {
        Self::NoResult {
            provider: provider.into(),
            query: query.into(),
        }
    }

    /// Whether retrying with backoff is safe: network failures and 5xx
    /// responses are transient, everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network { .. } => true,
            ProviderError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transience_classification() {
        assert!(ProviderError::network("pexels", "connection reset").is_transient());
        assert!(ProviderError::http("pexels", 503, "unavailable").is_transient());
        assert!(!ProviderError::http("pexels", 401, "bad key").is_transient());
        assert!(!ProviderError::no_result("pexels", "nature").is_transient());
        assert!(!ProviderError::decode("tts", "bad wav header").is_transient());
    }
}
