//! Configuration types for the bot-trust service.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration for the bot-trust service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotTrustConfig {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Edge header names and scale conventions
    pub edge: EdgeConfig,

    /// Soft-mode fusion constants
    pub fusion: FusionConfig,

    /// Remote risk-assessment service
    pub assessment: AssessmentConfig,

    /// Remote challenge-verification service
    pub verification: VerificationConfig,

    /// Static per-endpoint trust policy
    pub endpoints: BTreeMap<String, EndpointPolicy>,
}

impl Default for BotTrustConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            edge: EdgeConfig::default(),
            fusion: FusionConfig::default(),
            assessment: AssessmentConfig::default(),
            verification: VerificationConfig::default(),
            endpoints: default_endpoints(),
        }
    }
}

impl BotTrustConfig {
    /// Policy for a named endpoint. Unknown endpoints are soft-scored.
    pub fn endpoint(&self, name: &str) -> EndpointPolicy {
        self.endpoints.get(name).cloned().unwrap_or_default()
    }

    /// Whether any endpoint is declared fail-closed.
    pub fn has_hard_endpoints(&self) -> bool {
        self.endpoints.values().any(|p| p.mode == TrustMode::Hard)
    }

    /// Check startup invariants. Errors here are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.has_hard_endpoints()
            && self
                .verification
                .secret
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(ConfigError::ConfigurationMissing("verification.secret"));
        }
        self.validate_constants()
    }

    /// Check numeric settings only.
    pub fn validate_constants(&self) -> Result<(), ConfigError> {
        let unit = [
            ("fusion.bot_user_agent_trust", self.fusion.bot_user_agent_trust),
            ("fusion.human_user_agent_trust", self.fusion.human_user_agent_trust),
            ("fusion.proof_failure_ceiling", self.fusion.proof_failure_ceiling),
            ("fusion.proof_pass_baseline", self.fusion.proof_pass_baseline),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.assessment.timeout_ms == 0 || self.verification.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "external call timeouts must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Direction of the edge bot-confidence header.
///
/// The raw value alone cannot tell which reading applies, so it is pinned here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    /// 99 = most human, 0 = most bot
    #[default]
    HigherIsHuman,
    /// 99 = most bot, 0 = most human
    HigherIsBot,
}

/// Edge header names and conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Bot-confidence integer header (0-99)
    pub risk_header: String,

    /// Threat score header (0-100, higher = more threat)
    pub threat_header: String,

    /// Structured bot-management verdict (JSON)
    pub verdict_header: String,

    /// WAF detection flag
    pub waf_header: String,

    /// Client proof-of-execution status headers, checked in order
    pub proof_headers: Vec<String>,

    /// Cookie whose presence marks a passed clearance
    pub clearance_cookie: String,

    /// Reading of `risk_header`
    pub risk_score_direction: ScoreDirection,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            risk_header: "cf-bot-score".to_string(),
            threat_header: "cf-threat-score".to_string(),
            verdict_header: "cf-bot-management".to_string(),
            waf_header: "cf-waf".to_string(),
            proof_headers: vec![
                "x-cf-js-detection-result".to_string(),
                "x-cf-js-detection-status".to_string(),
            ],
            clearance_cookie: "cf_clearance".to_string(),
            risk_score_direction: ScoreDirection::HigherIsHuman,
        }
    }
}

/// Soft-mode fusion constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Use the user-agent heuristic as the last-resort base score
    pub user_agent_fallback: bool,

    /// Trust for a user agent matching automation patterns
    pub bot_user_agent_trust: f64,

    /// Trust for any other user agent
    pub human_user_agent_trust: f64,

    /// Ceiling applied when a proof signal reports failure
    pub proof_failure_ceiling: f64,

    /// Score assigned when a proof passes and only the fallback was available
    pub proof_pass_baseline: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            user_agent_fallback: true,
            bot_user_agent_trust: 0.2,
            human_user_agent_trust: 0.8,
            proof_failure_ceiling: 0.3,
            proof_pass_baseline: 0.7,
        }
    }
}

/// Remote risk-assessment service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    pub enabled: bool,

    /// API base, without the `/projects/...` suffix
    pub endpoint: String,

    pub project_id: String,

    pub api_key: String,

    pub site_key: String,

    /// Expected action when neither the request nor the endpoint names one
    pub default_action: String,

    /// Hard timeout for a single call
    pub timeout_ms: u64,
}

impl AssessmentConfig {
    /// Whether enough is configured to call the service.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.project_id.is_empty() && !self.api_key.is_empty()
    }
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://recaptchaenterprise.googleapis.com/v1".to_string(),
            project_id: String::new(),
            api_key: String::new(),
            site_key: String::new(),
            default_action: "submit".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Remote challenge-verification service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub endpoint: String,

    /// Required whenever a hard endpoint exists
    pub secret: Option<String>,

    pub timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string(),
            secret: None,
            timeout_ms: 10_000,
        }
    }
}

/// Which signal family is authoritative for an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    /// Fail-open continuous scoring
    #[default]
    Soft,
    /// Fail-closed challenge gate
    Hard,
}

impl TrustMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustMode::Soft => "soft",
            TrustMode::Hard => "hard",
        }
    }
}

/// Static policy for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPolicy {
    pub mode: TrustMode,

    /// Expected assessment action for this endpoint
    pub expected_action: Option<String>,
}

fn default_endpoints() -> BTreeMap<String, EndpointPolicy> {
    BTreeMap::from([
        ("bot_status".to_string(), EndpointPolicy::default()),
        ("evaluate".to_string(), EndpointPolicy::default()),
        (
            "contact".to_string(),
            EndpointPolicy {
                mode: TrustMode::Soft,
                expected_action: Some("CONTACT_SUBMIT".to_string()),
            },
        ),
        (
            "contact_verified".to_string(),
            EndpointPolicy {
                mode: TrustMode::Hard,
                expected_action: None,
            },
        ),
    ])
}
