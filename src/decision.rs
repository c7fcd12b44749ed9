//! Evaluation results and the response shapes built from them.

use crate::config::TrustMode;
use serde::{Deserialize, Serialize};

/// Ordered tag sequence with exact-string deduplication.
///
/// Tags record which signals fired; they never drive a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag unless an identical one is already present.
    pub fn push(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    /// Append every tag of `other`, in order.
    pub fn extend(&mut self, other: &TagSet) {
        for tag in &other.0 {
            self.push(tag.clone());
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = TagSet::new();
        for tag in iter {
            tags.push(tag);
        }
        tags
    }
}

/// Terminal verdict of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    /// Soft mode with no scoring signal at all
    Unscored,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Unscored => "unscored",
        }
    }
}

/// Result of evaluating one request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Trust in [0, 1]; `None` when no scoring signal was used
    pub score: Option<f64>,

    pub tags: TagSet,

    /// Resolved client proof-of-execution outcome
    pub proof_passed: Option<bool>,

    pub decision: Decision,

    /// Gate error codes; only set in hard mode
    pub error_codes: Option<Vec<String>>,
}

impl EvaluationResult {
    /// Soft-mode result.
    pub fn scored(score: Option<f64>, tags: TagSet, proof_passed: Option<bool>) -> Self {
        let decision = if score.is_some() {
            Decision::Allow
        } else {
            Decision::Unscored
        };
        Self {
            score,
            tags,
            proof_passed,
            decision,
            error_codes: None,
        }
    }

    /// Hard-mode allow.
    pub fn allowed() -> Self {
        Self {
            score: None,
            tags: TagSet::from_iter(["challenge_verified"]),
            proof_passed: None,
            decision: Decision::Allow,
            error_codes: Some(Vec::new()),
        }
    }

    /// Hard-mode deny with the codes surfaced to the caller.
    pub fn denied(error_codes: Vec<String>) -> Self {
        Self {
            score: None,
            tags: TagSet::from_iter(["challenge_rejected"]),
            proof_passed: None,
            decision: Decision::Deny,
            error_codes: Some(error_codes),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision != Decision::Deny
    }

    pub fn soft_response(&self) -> SoftResponse {
        SoftResponse {
            score: self.score,
            tags: self.tags.clone(),
            proof_passed: self.proof_passed,
        }
    }

    pub fn gate_response(&self) -> GateResponse {
        GateResponse {
            allowed: self.decision == Decision::Allow,
            error_codes: match self.decision {
                Decision::Deny => self.error_codes.clone(),
                _ => None,
            },
        }
    }

    /// Response shape for the endpoint's authoritative mode.
    pub fn response_for(&self, mode: TrustMode) -> EndpointResponse {
        match mode {
            TrustMode::Soft => EndpointResponse::Soft(self.soft_response()),
            TrustMode::Hard => EndpointResponse::Gate(self.gate_response()),
        }
    }
}

/// Wire response of either mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EndpointResponse {
    Soft(SoftResponse),
    Gate(GateResponse),
}

/// Soft-mode wire response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftResponse {
    pub score: Option<f64>,
    pub tags: TagSet,
    pub proof_passed: Option<bool>,
}

/// Hard-mode wire response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResponse {
    pub allowed: bool,
    pub error_codes: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_set_deduplicates_in_order() {
        let mut tags = TagSet::new();
        tags.push("verified_bot");
        tags.push("user-agent-bot");
        tags.push("verified_bot");
        assert_eq!(tags.as_slice(), ["verified_bot", "user-agent-bot"]);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_tag_set_serializes_as_array() {
        let tags: TagSet = ["a", "b"].into_iter().collect();
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_scored_decision() {
        let result = EvaluationResult::scored(Some(0.4), TagSet::new(), None);
        assert_eq!(result.decision, Decision::Allow);

        let result = EvaluationResult::scored(None, TagSet::new(), None);
        assert_eq!(result.decision, Decision::Unscored);
        assert!(result.is_allowed());
    }

    #[test]
    fn test_gate_response_shapes() {
        let denied = EvaluationResult::denied(vec!["verification_required".to_string()]);
        let json = serde_json::to_value(denied.gate_response()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"allowed": false, "errorCodes": ["verification_required"]})
        );

        let allowed = EvaluationResult::allowed();
        let json = serde_json::to_value(allowed.gate_response()).unwrap();
        assert_eq!(json, serde_json::json!({"allowed": true, "errorCodes": null}));
    }

    #[test]
    fn test_response_for_mode() {
        let result = EvaluationResult::scored(Some(0.5), TagSet::new(), None);
        let json = serde_json::to_value(result.response_for(TrustMode::Soft)).unwrap();
        assert_eq!(json["score"], 0.5);
        assert!(json.get("allowed").is_none());

        let json = serde_json::to_value(EvaluationResult::allowed().response_for(TrustMode::Hard))
            .unwrap();
        assert_eq!(json["allowed"], true);
        assert!(json.get("score").is_none());
    }

    #[test]
    fn test_soft_response_shape() {
        let tags: TagSet = ["user-agent-bot"].into_iter().collect();
        let result = EvaluationResult::scored(Some(0.2), tags, Some(false));
        let json = serde_json::to_value(result.soft_response()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"score": 0.2, "tags": ["user-agent-bot"], "proofPassed": false})
        );
    }
}
