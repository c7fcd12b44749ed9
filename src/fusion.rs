//! Soft-mode fusion.
//!
//! Picks a base score by precedence, then lets the proof-of-execution signal
//! corroborate it:
//!
//! 1. external assessment
//! 2. edge risk header
//! 3. edge threat header
//! 4. user-agent heuristic (fallback, always available)
//!
//! A failed proof caps the score; a passed proof only lifts a score that
//! came from the user-agent fallback. Lower-precedence sources still add tags.

use crate::config::FusionConfig;
use crate::decision::{EvaluationResult, TagSet};
use crate::normalize::{NormalizedSignal, NormalizedSignals};
use crate::signals::{SignalKind, SignalSet};
use tracing::debug;

/// Combines normalized signals into one score.
#[derive(Debug, Clone)]
pub struct FusionResolver {
    config: FusionConfig,
}

impl FusionResolver {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Highest-precedence scoring signal, if any.
    pub fn base(&self, normalized: &NormalizedSignals) -> Option<NormalizedSignal> {
        normalized
            .external
            .or(normalized.edge_risk)
            .or(normalized.edge_threat)
            .or_else(|| {
                self.config
                    .user_agent_fallback
                    .then_some(normalized.user_agent)
            })
    }

    /// Resolve the soft-mode result.
    pub fn resolve(&self, signals: &SignalSet, normalized: &NormalizedSignals) -> EvaluationResult {
        let mut tags = self.collect_tags(signals, normalized);

        let base = self.base(normalized);
        let mut score = base.map(|s| s.trust());
        let from_fallback = base.map_or(true, |s| s.source == SignalKind::UserAgentHeuristic);

        let proof_passed = normalized.proof.map(|p| p.passed());
        match proof_passed {
            Some(false) => {
                if let Some(base) = score {
                    score = Some(base.min(self.config.proof_failure_ceiling));
                    tags.push("js_detection_adjusted_score");
                }
            }
            Some(true) if from_fallback => {
                score = Some(self.config.proof_pass_baseline);
                tags.push("js_detection_base_score");
            }
            _ => {}
        }

        debug!(
            base_source = base.map(|s| s.source.as_str()).unwrap_or("none"),
            score = ?score,
            proof_passed = ?proof_passed,
            "Fusion resolved"
        );

        EvaluationResult::scored(score, tags, proof_passed)
    }

    /// Tags in evaluation order.
    fn collect_tags(&self, signals: &SignalSet, normalized: &NormalizedSignals) -> TagSet {
        let mut tags = signals.tags.clone();

        if let Some(verdict) = &signals.verdict {
            if verdict.verified_bot {
                tags.push("verified_bot");
            }
            if verdict.suspected_bot {
                tags.push("suspected_bot");
            }
        }

        if let Some(waf) = &signals.waf_flag {
            tags.push(format!("waf_detected:{waf}"));
        }

        if normalized.user_agent_matched {
            tags.push("user-agent-bot");
        }

        tags.extend(&normalized.assessment_tags);

        if let Some(proof) = normalized.proof {
            if proof.source == SignalKind::ClientProofCookie {
                tags.push("clearance_cookie_present");
            }
            tags.push(if proof.passed() {
                "js_detection_passed"
            } else {
                "js_detection_failed"
            });
        }

        tags
    }
}

impl Default for FusionResolver {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}
