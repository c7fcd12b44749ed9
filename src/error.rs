//! Error types for the bot-trust service.

use thiserror::Error;

/// Failure of an outbound call to a remote assessment or verification service.
///
/// These never reach the caller of a client: each client converts them into
/// its sentinel "invalid" response at its own boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalCallError {
    #[error("external call timed out")]
    Timeout,

    #[error("external call transport failure: {0}")]
    Transport(String),

    #[error("external call returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl ExternalCallError {
    /// Failure class reported as `invalidReason` on the sentinel response.
    pub fn class(&self) -> &'static str {
        match self {
            ExternalCallError::Timeout => "external_call_timeout",
            ExternalCallError::Transport(_) => "external_call_transport_failure",
            ExternalCallError::InvalidResponse(_) => "external_call_invalid_response",
        }
    }
}

impl From<reqwest::Error> for ExternalCallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExternalCallError::Timeout
        } else if err.is_decode() {
            ExternalCallError::InvalidResponse(err.to_string())
        } else {
            ExternalCallError::Transport(err.to_string())
        }
    }
}

/// Startup configuration errors. Fatal; never produced per request.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required configuration missing: {0}")]
    ConfigurationMissing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
