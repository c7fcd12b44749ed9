//! Challenge verification client.
//!
//! Redeems a challenge widget token with the site-verify endpoint:
//!
//! ```text
//! POST secret=<secret>&response=<token>
//! -> {"success": true, "error-codes": [], "challenge_ts": "...", "hostname": "..."}
//! ```
//!
//! Failures become an unsuccessful response carrying a local error code.

use crate::config::VerificationConfig;
use crate::error::{ConfigError, ExternalCallError};
use crate::signals::token_fingerprint;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a challenge verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default, rename = "error-codes", alias = "error_codes")]
    pub error_codes: Vec<String>,

    #[serde(default)]
    pub challenge_ts: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,
}

impl VerificationResponse {
    /// Unsuccessful response with a single error code.
    pub fn failure(code: impl Into<String>) -> Self {
        Self {
            success: false,
            error_codes: vec![code.into()],
            challenge_ts: None,
            hostname: None,
        }
    }
}

/// Anything that can verify a challenge token.
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    /// Verify a token. Must not fail; failures become unsuccessful responses.
    async fn verify(&self, token: &str) -> VerificationResponse;

    /// Get the verifier name.
    fn name(&self) -> &'static str;
}

/// HTTP client for the site-verify endpoint.
pub struct SiteVerifyClient {
    client: Client,
    endpoint: String,
    secret: String,
}

impl SiteVerifyClient {
    /// Create a client. A missing secret is a fatal configuration error.
    pub fn new(config: &VerificationConfig) -> Result<Self, ConfigError> {
        let secret = config
            .secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::ConfigurationMissing("verification.secret"))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            secret: secret.to_string(),
        })
    }

    async fn call(&self, token: &str) -> Result<VerificationResponse, ExternalCallError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Challenge verification HTTP error");
            return Ok(VerificationResponse::failure("http-error"));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ExternalCallError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChallengeVerifier for SiteVerifyClient {
    async fn verify(&self, token: &str) -> VerificationResponse {
        let token_fp = token_fingerprint(token);
        match self.call(token).await {
            Ok(response) => {
                debug!(
                    token_fp = %token_fp,
                    success = response.success,
                    error_codes = ?response.error_codes,
                    hostname = ?response.hostname,
                    "Challenge verification complete"
                );
                response
            }
            Err(error) => {
                warn!(
                    token_fp = %token_fp,
                    class = error.class(),
                    error = %error,
                    "Challenge verification call failed"
                );
                VerificationResponse::failure(match error {
                    ExternalCallError::Timeout => "timeout-error",
                    ExternalCallError::Transport(_) => "network-error",
                    ExternalCallError::InvalidResponse(_) => "invalid-response",
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        "site_verify"
    }
}
