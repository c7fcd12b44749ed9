//! Trust evaluator: runs extraction, normalization and the endpoint's
//! resolver, and assembles the final [`EvaluationResult`].

use crate::assessment::{AssessmentClient, AssessmentRecord, RiskAssessor};
use crate::config::{BotTrustConfig, TrustMode};
use crate::decision::EvaluationResult;
use crate::error::ConfigError;
use crate::fusion::FusionResolver;
use crate::gate::GateResolver;
use crate::normalize::Normalizer;
use crate::signals::{RequestContext, SignalExtractor, SignalSet};
use crate::verification::{ChallengeVerifier, SiteVerifyClient};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Evaluates requests for every configured endpoint.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct TrustEvaluator {
    /// Configuration
    config: BotTrustConfig,
    /// Signal extractor
    extractor: SignalExtractor,
    /// Scale normalizer
    normalizer: Normalizer,
    /// Soft-mode resolver
    fusion: FusionResolver,
    /// Opaque-token assessor, if configured
    assessor: Option<Arc<dyn RiskAssessor>>,
    /// Hard-mode resolver, present whenever a hard endpoint exists
    gate: Option<GateResolver>,
}

impl TrustEvaluator {
    /// Create an evaluator with HTTP clients built from configuration.
    pub fn from_config(config: BotTrustConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let assessor: Option<Arc<dyn RiskAssessor>> = if config.assessment.is_usable() {
            Some(Arc::new(AssessmentClient::new(&config.assessment)?))
        } else {
            if config.assessment.enabled {
                warn!("Assessment project or API key not configured, opaque tokens will be ignored");
            }
            None
        };

        let verifier: Option<Arc<dyn ChallengeVerifier>> = if config.has_hard_endpoints() {
            Some(Arc::new(SiteVerifyClient::new(&config.verification)?))
        } else {
            None
        };

        Self::new(config, assessor, verifier)
    }

    /// Create an evaluator with caller-supplied collaborators.
    pub fn new(
        config: BotTrustConfig,
        assessor: Option<Arc<dyn RiskAssessor>>,
        verifier: Option<Arc<dyn ChallengeVerifier>>,
    ) -> Result<Self, ConfigError> {
        config.validate_constants()?;
        if config.has_hard_endpoints() && verifier.is_none() {
            return Err(ConfigError::ConfigurationMissing("verification.secret"));
        }

        info!(
            endpoints = config.endpoints.len(),
            assessment = assessor.is_some(),
            gate = verifier.is_some(),
            risk_direction = ?config.edge.risk_score_direction,
            "Trust evaluator ready"
        );

        Ok(Self {
            extractor: SignalExtractor::new(config.edge.clone()),
            normalizer: Normalizer::new(config.edge.risk_score_direction, &config.fusion),
            fusion: FusionResolver::new(config.fusion.clone()),
            gate: verifier.map(GateResolver::new),
            assessor,
            config,
        })
    }

    pub fn config(&self) -> &BotTrustConfig {
        &self.config
    }

    /// Authoritative signal family for an endpoint.
    pub fn mode_for(&self, endpoint: &str) -> TrustMode {
        self.config.endpoint(endpoint).mode
    }

    /// Extract signals from a request.
    pub fn extract(&self, ctx: &RequestContext) -> SignalSet {
        self.extractor.extract(ctx)
    }

    /// Evaluate a request for an endpoint.
    pub async fn evaluate(&self, endpoint: &str, ctx: &RequestContext) -> EvaluationResult {
        let signals = self.extract(ctx);
        self.evaluate_signals(endpoint, &signals).await
    }

    /// Evaluate already-extracted signals for an endpoint.
    pub async fn evaluate_signals(&self, endpoint: &str, signals: &SignalSet) -> EvaluationResult {
        let mode = self.mode_for(endpoint);
        debug!(
            endpoint = endpoint,
            mode = mode.as_str(),
            signals = ?signals.present_kinds(),
            "Evaluating request"
        );

        let result = match mode {
            TrustMode::Soft => {
                let action = self.expected_action(endpoint, signals);
                let (normalized, _record) = self
                    .normalizer
                    .normalize_with(signals, self.assessor.as_deref(), &action)
                    .await;
                self.fusion.resolve(signals, &normalized)
            }
            TrustMode::Hard => match &self.gate {
                Some(gate) => gate.resolve(signals.challenge_token.as_deref()).await,
                // unreachable after construction checks; stay closed regardless
                None => EvaluationResult::denied(vec!["verification_unavailable".to_string()]),
            },
        };

        info!(
            endpoint = endpoint,
            mode = mode.as_str(),
            score = ?result.score,
            decision = result.decision.as_str(),
            proof_passed = ?result.proof_passed,
            tags = ?result.tags,
            "Trust evaluation complete"
        );

        result
    }

    /// Soft-mode evaluation of a fixed signal set and a completed assessment.
    ///
    /// Performs no remote call, so replaying the same input yields the same
    /// result.
    pub fn evaluate_soft(
        &self,
        signals: &SignalSet,
        assessment: Option<&AssessmentRecord>,
    ) -> EvaluationResult {
        let normalized = self.normalizer.normalize(signals, assessment);
        self.fusion.resolve(signals, &normalized)
    }

    /// Action the opaque token is expected to carry: the client's claim, then
    /// the endpoint's policy, then the global default.
    fn expected_action(&self, endpoint: &str, signals: &SignalSet) -> String {
        signals
            .opaque_token
            .as_ref()
            .and_then(|t| t.expected_action.clone())
            .or_else(|| self.config.endpoint(endpoint).expected_action)
            .unwrap_or_else(|| self.config.assessment.default_action.clone())
    }
}
