//! Scale normalization.
//!
//! Every scoring signal is mapped onto one scale: trust in [0, 1], where 1.0
//! is most human-like. Native scales differ in range and direction:
//!
//! | Signal            | Native           | Trust                       |
//! |-------------------|------------------|-----------------------------|
//! | Edge risk         | 0-99             | `v/100` (or `1 - v/100`)    |
//! | Edge threat       | 0-100, up = bad  | `1 - v/100`                 |
//! | User-Agent        | match / no match | 0.2 / 0.8                   |
//! | Assessment        | 0.0-1.0          | score, 0.0 if token invalid |
//! | Client proof      | pass / fail      | 1.0 / 0.0, corroborating    |

use crate::assessment::{AssessmentRecord, AssessmentRequest, RiskAssessor};
use crate::config::{FusionConfig, ScoreDirection};
use crate::decision::TagSet;
use crate::signals::{token_fingerprint, user_agent, SignalKind, SignalSet};
use serde::Serialize;
use tracing::debug;

/// One signal on the common trust scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedSignal {
    pub source: SignalKind,
    trust: f64,
    /// Adjusts a base score but never provides one
    pub corroborating: bool,
}

impl NormalizedSignal {
    /// Scoring signal. Returns `None` for non-finite or out-of-range trust.
    pub fn scoring(source: SignalKind, trust: f64) -> Option<Self> {
        if trust.is_finite() && (0.0..=1.0).contains(&trust) {
            Some(Self {
                source,
                trust,
                corroborating: false,
            })
        } else {
            None
        }
    }

    /// Pass/fail proof signal.
    pub fn proof(source: SignalKind, passed: bool) -> Self {
        Self {
            source,
            trust: if passed { 1.0 } else { 0.0 },
            corroborating: true,
        }
    }

    pub fn trust(&self) -> f64 {
        self.trust
    }

    /// Proof outcome for corroborating signals.
    pub fn passed(&self) -> bool {
        self.trust >= 1.0
    }
}

/// All normalized signals of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSignals {
    pub external: Option<NormalizedSignal>,
    pub edge_risk: Option<NormalizedSignal>,
    pub edge_threat: Option<NormalizedSignal>,
    /// Always computable
    pub user_agent: NormalizedSignal,
    pub user_agent_matched: bool,
    /// Resolved proof-of-execution outcome
    pub proof: Option<NormalizedSignal>,
    /// Tags from the assessment (mismatch, invalid token, no score)
    pub assessment_tags: TagSet,
}

/// Converts native signal scales to trust.
#[derive(Debug, Clone)]
pub struct Normalizer {
    risk_direction: ScoreDirection,
    bot_user_agent_trust: f64,
    human_user_agent_trust: f64,
}

impl Normalizer {
    pub fn new(risk_direction: ScoreDirection, fusion: &FusionConfig) -> Self {
        Self {
            risk_direction,
            bot_user_agent_trust: unit(fusion.bot_user_agent_trust),
            human_user_agent_trust: unit(fusion.human_user_agent_trust),
        }
    }

    /// Edge bot-confidence in [0, 99].
    pub fn edge_risk(&self, value: u8) -> Option<NormalizedSignal> {
        let v = f64::from(value.min(99)) / 100.0;
        let trust = match self.risk_direction {
            ScoreDirection::HigherIsHuman => v,
            ScoreDirection::HigherIsBot => 1.0 - v,
        };
        NormalizedSignal::scoring(SignalKind::EdgeRiskHeader, trust)
    }

    /// Edge threat in [0, 100], higher = more threat.
    pub fn edge_threat(&self, value: u8) -> Option<NormalizedSignal> {
        let trust = 1.0 - f64::from(value.min(100)) / 100.0;
        NormalizedSignal::scoring(SignalKind::EdgeThreatHeader, trust)
    }

    /// User-Agent heuristic; returns the signal and whether it matched.
    pub fn user_agent(&self, ua: &str) -> (NormalizedSignal, bool) {
        let keyword = user_agent::matched_keyword(ua);
        if let Some(keyword) = keyword {
            debug!(keyword = keyword, "User-Agent matches automation pattern");
        }
        let matched = keyword.is_some();
        let trust = if matched {
            self.bot_user_agent_trust
        } else {
            self.human_user_agent_trust
        };
        let signal = NormalizedSignal {
            source: SignalKind::UserAgentHeuristic,
            trust,
            corroborating: false,
        };
        (signal, matched)
    }

    /// Assessment outcome, with the tags it produced.
    pub fn assessment(&self, record: &AssessmentRecord) -> (Option<NormalizedSignal>, TagSet) {
        let mut tags = TagSet::new();
        let response = &record.response;

        if !response.token_valid {
            let reason = response.invalid_reason.as_deref().unwrap_or("invalid_token");
            tags.push(format!("assessment_invalid:{reason}"));
            return (
                NormalizedSignal::scoring(SignalKind::ExternalAssessment, 0.0),
                tags,
            );
        }

        if record.action_mismatch() {
            tags.push("action_mismatch");
        }

        let signal = response
            .risk_score
            .and_then(|score| NormalizedSignal::scoring(SignalKind::ExternalAssessment, score));
        if signal.is_none() {
            tags.push("assessment_unscored");
        }
        (signal, tags)
    }

    /// Resolve the proof outcome: header, then body report, then cookie;
    /// the edge verdict's own detection result overrides all of them.
    pub fn proof(&self, signals: &SignalSet) -> Option<NormalizedSignal> {
        let client = signals
            .proof_header
            .or(signals.proof_reported)
            .map(|passed| NormalizedSignal::proof(SignalKind::ClientProofHeader, passed))
            .or_else(|| {
                signals
                    .clearance_cookie
                    .then(|| NormalizedSignal::proof(SignalKind::ClientProofCookie, true))
            });

        let edge = signals
            .verdict
            .as_ref()
            .and_then(|v| v.js_detection)
            .map(|passed| NormalizedSignal::proof(SignalKind::EdgeVerdictBlob, passed));

        edge.or(client)
    }

    /// Normalize an extracted signal set and an optional, already-completed
    /// assessment. Performs no I/O.
    pub fn normalize(
        &self,
        signals: &SignalSet,
        assessment: Option<&AssessmentRecord>,
    ) -> NormalizedSignals {
        let (external, assessment_tags) = match assessment {
            Some(record) => self.assessment(record),
            None => (None, TagSet::new()),
        };
        let (user_agent, user_agent_matched) = self.user_agent(&signals.user_agent);

        NormalizedSignals {
            external,
            edge_risk: signals.edge_risk.and_then(|v| self.edge_risk(v)),
            edge_threat: signals.edge_threat.and_then(|v| self.edge_threat(v)),
            user_agent,
            user_agent_matched,
            proof: self.proof(signals),
            assessment_tags,
        }
    }

    /// Redeem the request's opaque token (if any) and normalize.
    ///
    /// This is the only suspending step of an evaluation.
    pub async fn normalize_with(
        &self,
        signals: &SignalSet,
        assessor: Option<&dyn RiskAssessor>,
        expected_action: &str,
    ) -> (NormalizedSignals, Option<AssessmentRecord>) {
        let record = match (assessor, signals.opaque_token.as_ref()) {
            (Some(assessor), Some(token)) => {
                let request = AssessmentRequest {
                    token: token.token.clone(),
                    expected_action: expected_action.to_string(),
                };
                debug!(
                    assessor = assessor.name(),
                    token_fp = %token_fingerprint(&request.token),
                    expected_action = %request.expected_action,
                    "Redeeming opaque token"
                );
                let response = assessor.assess(&request).await;
                Some(AssessmentRecord { request, response })
            }
            _ => None,
        };

        (self.normalize(signals, record.as_ref()), record)
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ScoreDirection::default(), &FusionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::AssessmentResponse;
    use crate::signals::VerdictBlob;

    fn record(valid: bool, score: Option<f64>, action: Option<&str>) -> AssessmentRecord {
        AssessmentRecord {
            request: AssessmentRequest {
                token: "tok".to_string(),
                expected_action: "submit".to_string(),
            },
            response: AssessmentResponse {
                token_valid: valid,
                invalid_reason: (!valid).then(|| "EXPIRED".to_string()),
                risk_score: score,
                matched_action: action.map(str::to_string),
                reasons: vec![],
            },
        }
    }

    #[test]
    fn test_scoring_rejects_out_of_range() {
        assert!(NormalizedSignal::scoring(SignalKind::EdgeRiskHeader, 1.01).is_none());
        assert!(NormalizedSignal::scoring(SignalKind::EdgeRiskHeader, -0.01).is_none());
        assert!(NormalizedSignal::scoring(SignalKind::EdgeRiskHeader, f64::NAN).is_none());
        assert!(NormalizedSignal::scoring(SignalKind::EdgeRiskHeader, 0.0).is_some());
        assert!(NormalizedSignal::scoring(SignalKind::EdgeRiskHeader, 1.0).is_some());
    }

    #[test]
    fn test_edge_risk_directions() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.edge_risk(90).unwrap().trust(), 0.9);

        let inverted = Normalizer::new(ScoreDirection::HigherIsBot, &FusionConfig::default());
        assert_eq!(inverted.edge_risk(90).unwrap().trust(), 1.0 - 0.9);
        assert_eq!(inverted.edge_risk(0).unwrap().trust(), 1.0);
    }

    #[test]
    fn test_edge_threat() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.edge_threat(0).unwrap().trust(), 1.0);
        assert_eq!(normalizer.edge_threat(100).unwrap().trust(), 0.0);
        assert_eq!(normalizer.edge_threat(25).unwrap().trust(), 0.75);
    }

    #[test]
    fn test_user_agent() {
        let normalizer = Normalizer::default();
        let (signal, matched) = normalizer.user_agent("curl/8.0");
        assert!(matched);
        assert_eq!(signal.trust(), 0.2);

        let (signal, matched) = normalizer.user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0");
        assert!(!matched);
        assert_eq!(signal.trust(), 0.8);
        assert!(!signal.corroborating);
    }

    #[test]
    fn test_invalid_assessment_is_zero_trust() {
        let normalizer = Normalizer::default();
        let (signal, tags) = normalizer.assessment(&record(false, Some(0.9), None));
        assert_eq!(signal.unwrap().trust(), 0.0);
        assert!(tags.contains("assessment_invalid:EXPIRED"));
    }

    #[test]
    fn test_assessment_action_mismatch_is_tag_only() {
        let normalizer = Normalizer::default();
        let (signal, tags) = normalizer.assessment(&record(true, Some(0.9), Some("login")));
        assert_eq!(signal.unwrap().trust(), 0.9);
        assert_eq!(tags.as_slice(), ["action_mismatch"]);

        let (_, tags) = normalizer.assessment(&record(true, Some(0.9), Some("submit")));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_unscored_assessment() {
        let normalizer = Normalizer::default();
        let (signal, tags) = normalizer.assessment(&record(true, None, Some("submit")));
        assert!(signal.is_none());
        assert!(tags.contains("assessment_unscored"));
    }

    #[test]
    fn test_proof_resolution_order() {
        let normalizer = Normalizer::default();

        let signals = SignalSet {
            clearance_cookie: true,
            ..Default::default()
        };
        let proof = normalizer.proof(&signals).unwrap();
        assert_eq!(proof.source, SignalKind::ClientProofCookie);
        assert!(proof.passed());

        let signals = SignalSet {
            proof_header: Some(false),
            proof_reported: Some(true),
            clearance_cookie: true,
            ..Default::default()
        };
        let proof = normalizer.proof(&signals).unwrap();
        assert_eq!(proof.source, SignalKind::ClientProofHeader);
        assert!(!proof.passed());
        assert!(proof.corroborating);

        let signals = SignalSet {
            proof_header: Some(true),
            verdict: Some(VerdictBlob {
                js_detection: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let proof = normalizer.proof(&signals).unwrap();
        assert_eq!(proof.source, SignalKind::EdgeVerdictBlob);
        assert!(!proof.passed());

        assert!(normalizer.proof(&SignalSet::default()).is_none());
    }

    #[test]
    fn test_normalize_without_assessment() {
        let normalizer = Normalizer::default();
        let signals = SignalSet {
            edge_risk: Some(30),
            edge_threat: Some(10),
            user_agent: "Googlebot".to_string(),
            ..Default::default()
        };
        let normalized = normalizer.normalize(&signals, None);
        assert!(normalized.external.is_none());
        assert_eq!(normalized.edge_risk.unwrap().trust(), 0.3);
        assert_eq!(normalized.edge_threat.unwrap().trust(), 0.9);
        assert!(normalized.user_agent_matched);
        assert!(normalized.assessment_tags.is_empty());
    }
}
