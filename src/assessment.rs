//! Remote risk-assessment client.
//!
//! Redeems a single-use opaque token against the assessment service. Every
//! failure (timeout, transport, bad status, malformed body) is folded into a
//! sentinel invalid response: callers never see an error from this module.
//!
//! Calls are never retried, since the upstream token is single-use. Dropping
//! the returned future aborts the in-flight request.

use crate::config::AssessmentConfig;
use crate::error::{ConfigError, ExternalCallError};
use crate::signals::token_fingerprint;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// What is sent to the assessment service.
#[derive(Clone, PartialEq, Eq)]
pub struct AssessmentRequest {
    pub token: String,
    pub expected_action: String,
}

impl std::fmt::Debug for AssessmentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentRequest")
            .field("token", &token_fingerprint(&self.token))
            .field("expected_action", &self.expected_action)
            .finish()
    }
}

/// Normalized outcome of one assessment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    pub token_valid: bool,
    pub invalid_reason: Option<String>,
    /// Upstream score, 1.0 = most human
    pub risk_score: Option<f64>,
    pub matched_action: Option<String>,
    /// Upstream risk reasons
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl AssessmentResponse {
    /// Sentinel returned for any failed call.
    pub fn failed(error: &ExternalCallError) -> Self {
        Self {
            token_valid: false,
            invalid_reason: Some(error.class().to_string()),
            risk_score: None,
            matched_action: None,
            reasons: Vec::new(),
        }
    }
}

/// A request/response pair, kept together so the action check can be replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRecord {
    pub request: AssessmentRequest,
    pub response: AssessmentResponse,
}

impl AssessmentRecord {
    /// True when the service accepted the token for a different action.
    pub fn action_mismatch(&self) -> bool {
        self.response.token_valid
            && self.response.matched_action.as_deref() != Some(self.request.expected_action.as_str())
    }
}

/// Anything that can redeem an opaque token.
#[async_trait]
pub trait RiskAssessor: Send + Sync {
    /// Assess a token. Must not fail; failures become sentinel responses.
    async fn assess(&self, request: &AssessmentRequest) -> AssessmentResponse;

    /// Get the assessor name.
    fn name(&self) -> &'static str;
}

#[derive(Serialize)]
struct CreateAssessment<'a> {
    event: AssessmentEvent<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssessmentEvent<'a> {
    token: &'a str,
    site_key: &'a str,
    expected_action: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssessmentWire {
    token_properties: Option<TokenProperties>,
    risk_analysis: Option<RiskAnalysis>,
    error: Option<UpstreamError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenProperties {
    valid: Option<bool>,
    action: Option<String>,
    invalid_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RiskAnalysis {
    score: Option<f64>,
    reasons: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamError {
    message: Option<String>,
}

impl AssessmentWire {
    fn into_response(self) -> Result<AssessmentResponse, ExternalCallError> {
        if let Some(error) = self.error {
            return Err(ExternalCallError::InvalidResponse(
                error.message.unwrap_or_else(|| "upstream error".to_string()),
            ));
        }

        let properties = self.token_properties.unwrap_or_default();
        if properties.valid != Some(true) {
            return Ok(AssessmentResponse {
                token_valid: false,
                invalid_reason: Some(
                    properties
                        .invalid_reason
                        .unwrap_or_else(|| "invalid_token".to_string()),
                ),
                risk_score: None,
                matched_action: properties.action,
                reasons: Vec::new(),
            });
        }

        let analysis = self.risk_analysis.unwrap_or_default();
        if let Some(score) = analysis.score {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(ExternalCallError::InvalidResponse(format!(
                    "risk score out of range: {score}"
                )));
            }
        }

        Ok(AssessmentResponse {
            token_valid: true,
            invalid_reason: None,
            risk_score: analysis.score,
            matched_action: properties.action,
            reasons: analysis.reasons.unwrap_or_default(),
        })
    }
}

/// HTTP client for the assessment service.
pub struct AssessmentClient {
    client: Client,
    url: String,
    api_key: String,
    site_key: String,
}

impl AssessmentClient {
    /// Create a client from configuration.
    pub fn new(config: &AssessmentConfig) -> Result<Self, ConfigError> {
        if config.project_id.is_empty() {
            return Err(ConfigError::ConfigurationMissing("assessment.project_id"));
        }
        if config.api_key.is_empty() {
            return Err(ConfigError::ConfigurationMissing("assessment.api_key"));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/projects/{}/assessments",
                config.endpoint.trim_end_matches('/'),
                config.project_id
            ),
            api_key: config.api_key.clone(),
            site_key: config.site_key.clone(),
        })
    }

    async fn call(
        &self,
        request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, ExternalCallError> {
        let body = CreateAssessment {
            event: AssessmentEvent {
                token: &request.token,
                site_key: &self.site_key,
                expected_action: &request.expected_action,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalCallError::InvalidResponse(format!("HTTP {status}")));
        }

        let bytes = response.bytes().await?;
        let wire: AssessmentWire = serde_json::from_slice(&bytes)
            .map_err(|e| ExternalCallError::InvalidResponse(e.to_string()))?;
        wire.into_response()
    }
}

#[async_trait]
impl RiskAssessor for AssessmentClient {
    async fn assess(&self, request: &AssessmentRequest) -> AssessmentResponse {
        let token_fp = token_fingerprint(&request.token);
        match self.call(request).await {
            Ok(response) => {
                debug!(
                    token_fp = %token_fp,
                    valid = response.token_valid,
                    risk_score = ?response.risk_score,
                    action = ?response.matched_action,
                    "Assessment complete"
                );
                response
            }
            Err(error) => {
                warn!(
                    token_fp = %token_fp,
                    class = error.class(),
                    error = %error,
                    "Assessment call failed"
                );
                AssessmentResponse::failed(&error)
            }
        }
    }

    fn name(&self) -> &'static str {
        "assessment_client"
    }
}
