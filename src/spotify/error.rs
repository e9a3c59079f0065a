//! Error taxonomy for the Spotify client.

use thiserror::Error;

/// Errors produced by [`SpotifyClient`](super::SpotifyClient).
///
/// `Clone` so that a single settled outcome can be handed to every caller
/// waiting on the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Credentials are missing. Never retried.
    #[error("missing Spotify credentials: {0}")]
    Configuration(String),

    /// Token endpoint rejected the credentials (HTTP 400/401).
    #[error("invalid credentials: {body}")]
    InvalidCredentials { body: String },

    /// Token endpoint answered with some other non-2xx status.
    #[error("token endpoint error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// A 2xx response whose body could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport-level failure (connect, reset, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Token acquisition failed on every attempt.
    #[error("authentication failed after {attempts} attempts: {source}")]
    AuthenticationFailed {
        attempts: u32,
        source: Box<ApiError>,
    },

    /// 4xx on a resource call other than 401/429. Terminal.
    #[error("error {status}: {message}")]
    Client { status: u16, message: String },

    /// 5xx on a resource call.
    #[error("Spotify server error: {status}")]
    UpstreamServer { status: u16 },

    /// 429 on a resource call.
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Every attempt of a resource call was consumed without success.
    #[error("all {attempts} attempts failed for {endpoint}")]
    RequestExhausted {
        endpoint: String,
        attempts: u32,
        last: Option<Box<ApiError>>,
    },

    /// A failure annotated with what the caller was trying to do.
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Whether a resource call attempt that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Protocol(_)
                | ApiError::Network(_)
                | ApiError::UpstreamServer { .. }
                | ApiError::RateLimited { .. }
        )
    }

    /// Wrap this error with a description of the failed operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        ApiError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any [`ApiError::Context`] layers.
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Protocol(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
