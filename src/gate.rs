//! Hard-mode gate.
//!
//! A single authoritative challenge token decides the request. There are two
//! terminal states and no retries: a missing token or a failed verification
//! denies, a successful verification allows.

use crate::decision::EvaluationResult;
use crate::signals::token_fingerprint;
use crate::verification::ChallengeVerifier;
use std::sync::Arc;
use tracing::{debug, info};

/// Error code for a request that carried no challenge token.
pub const VERIFICATION_REQUIRED: &str = "verification_required";

/// Error code for a failed verification that came back without codes.
pub const VERIFICATION_FAILED: &str = "verification_failed";

/// Fail-closed resolver over the challenge-verification signal.
pub struct GateResolver {
    verifier: Arc<dyn ChallengeVerifier>,
}

impl GateResolver {
    pub fn new(verifier: Arc<dyn ChallengeVerifier>) -> Self {
        Self { verifier }
    }

    /// Gate a request on its challenge token.
    pub async fn resolve(&self, challenge_token: Option<&str>) -> EvaluationResult {
        let Some(token) = challenge_token.filter(|t| !t.is_empty()) else {
            debug!("No challenge token, denying");
            return EvaluationResult::denied(vec![VERIFICATION_REQUIRED.to_string()]);
        };

        let response = self.verifier.verify(token).await;
        if response.success {
            debug!(
                token_fp = %token_fingerprint(token),
                hostname = ?response.hostname,
                "Challenge verified"
            );
            return EvaluationResult::allowed();
        }

        let error_codes = if response.error_codes.is_empty() {
            vec![VERIFICATION_FAILED.to_string()]
        } else {
            response.error_codes
        };
        info!(
            verifier = self.verifier.name(),
            token_fp = %token_fingerprint(token),
            error_codes = ?error_codes,
            "Challenge verification rejected"
        );
        EvaluationResult::denied(error_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;
    use crate::verification::VerificationResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedVerifier {
        response: VerificationResponse,
        calls: AtomicUsize,
    }

    impl FixedVerifier {
        fn new(response: VerificationResponse) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChallengeVerifier for FixedVerifier {
        async fn verify(&self, _token: &str) -> VerificationResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_absent_token_denies_without_call() {
        let verifier = FixedVerifier::new(VerificationResponse {
            success: true,
            ..Default::default()
        });
        let gate = GateResolver::new(verifier.clone());

        let result = gate.resolve(None).await;
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.error_codes, Some(vec![VERIFICATION_REQUIRED.to_string()]));
        assert_eq!(result.score, None);

        let result = gate.resolve(Some("")).await;
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_allows() {
        let verifier = FixedVerifier::new(VerificationResponse {
            success: true,
            hostname: Some("example.com".to_string()),
            ..Default::default()
        });
        let gate = GateResolver::new(verifier.clone());

        let result = gate.resolve(Some("token")).await;
        assert_eq!(result.decision, Decision::Allow);
        assert!(result.gate_response().allowed);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_surfaces_upstream_codes() {
        let verifier = FixedVerifier::new(VerificationResponse {
            success: false,
            error_codes: vec!["timeout-or-duplicate".to_string()],
            ..Default::default()
        });
        let result = GateResolver::new(verifier).resolve(Some("token")).await;
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(
            result.gate_response().error_codes,
            Some(vec!["timeout-or-duplicate".to_string()])
        );
    }

    #[tokio::test]
    async fn test_failure_without_codes() {
        let verifier = FixedVerifier::new(VerificationResponse::default());
        let result = GateResolver::new(verifier).resolve(Some("token")).await;
        assert_eq!(result.error_codes, Some(vec![VERIFICATION_FAILED.to_string()]));
    }
}
