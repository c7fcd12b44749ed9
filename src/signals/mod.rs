//! Signal extraction.
//!
//! Turns a raw request context into a [`SignalSet`]: one typed, optional value
//! per signal kind. Missing or malformed input is absence, never an error.

pub mod user_agent;
pub mod verdict;

pub use verdict::{parse_verdict, VerdictBlob, VerdictParse};

use crate::config::EdgeConfig;
use crate::decision::TagSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Kinds of anti-automation evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    EdgeRiskHeader,
    EdgeThreatHeader,
    EdgeVerdictBlob,
    ClientProofHeader,
    ClientProofCookie,
    UserAgentHeuristic,
    ExternalAssessment,
    ChallengeVerification,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::EdgeRiskHeader => "edge_risk_header",
            SignalKind::EdgeThreatHeader => "edge_threat_header",
            SignalKind::EdgeVerdictBlob => "edge_verdict_blob",
            SignalKind::ClientProofHeader => "client_proof_header",
            SignalKind::ClientProofCookie => "client_proof_cookie",
            SignalKind::UserAgentHeuristic => "user_agent_heuristic",
            SignalKind::ExternalAssessment => "external_assessment",
            SignalKind::ChallengeVerification => "challenge_verification",
        }
    }
}

/// Evidence carried in a JSON request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluationBody {
    /// Single-use risk-assessment token
    #[serde(alias = "recaptchaToken")]
    pub opaque_token: Option<String>,

    pub expected_action: Option<String>,

    /// Proof-of-execution outcome reported by the client widget
    pub client_reported_proof_status: Option<bool>,

    /// Single-use challenge token for hard-mode endpoints
    #[serde(alias = "turnstileToken")]
    pub challenge_token: Option<String>,
}

/// Request information available to extraction.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request headers (lowercase keys)
    pub headers: HashMap<String, Vec<String>>,
    /// Parsed JSON body, if the request carried one
    pub body: Option<EvaluationBody>,
}

impl RequestContext {
    /// Build from header pairs; names are lowercased.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in pairs {
            headers
                .entry(name.to_lowercase())
                .or_default()
                .push(value.to_string());
        }
        Self {
            headers,
            body: None,
        }
    }

    pub fn with_body(mut self, body: EvaluationBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Get a single header value (first if multiple).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    /// Get the User-Agent header.
    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Look up a cookie by name across all `cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let values = self.headers.get("cookie")?;
        values
            .iter()
            .flat_map(|header| header.split(';'))
            .find_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key == name).then_some(value)
            })
    }
}

/// Opaque assessment token with the action the client claims.
#[derive(Clone, PartialEq, Eq)]
pub struct OpaqueToken {
    pub token: String,
    pub expected_action: Option<String>,
}

impl std::fmt::Debug for OpaqueToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueToken")
            .field("token", &"<redacted>")
            .field("expected_action", &self.expected_action)
            .finish()
    }
}

/// Every signal extracted from one request. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet {
    /// Edge bot-confidence, native [0, 99]
    pub edge_risk: Option<u8>,
    /// Edge threat score, native [0, 100]
    pub edge_threat: Option<u8>,
    pub verdict: Option<VerdictBlob>,
    /// Raw WAF flag value
    pub waf_flag: Option<String>,
    /// Proof status from the client proof header
    pub proof_header: Option<bool>,
    /// Proof status reported in the request body
    pub proof_reported: Option<bool>,
    /// Clearance cookie present
    pub clearance_cookie: bool,
    /// Always present; empty when the header is missing
    pub user_agent: String,
    pub opaque_token: Option<OpaqueToken>,
    pub challenge_token: Option<String>,
    /// Tags recorded while extracting (e.g. unparseable verdict)
    pub tags: TagSet,
}

impl SignalSet {
    /// Kinds with a present value, for logging.
    pub fn present_kinds(&self) -> Vec<SignalKind> {
        let mut kinds = Vec::new();
        if self.edge_risk.is_some() {
            kinds.push(SignalKind::EdgeRiskHeader);
        }
        if self.edge_threat.is_some() {
            kinds.push(SignalKind::EdgeThreatHeader);
        }
        if self.verdict.is_some() {
            kinds.push(SignalKind::EdgeVerdictBlob);
        }
        if self.proof_header.is_some() || self.proof_reported.is_some() {
            kinds.push(SignalKind::ClientProofHeader);
        }
        if self.clearance_cookie {
            kinds.push(SignalKind::ClientProofCookie);
        }
        kinds.push(SignalKind::UserAgentHeuristic);
        if self.opaque_token.is_some() {
            kinds.push(SignalKind::ExternalAssessment);
        }
        if self.challenge_token.is_some() {
            kinds.push(SignalKind::ChallengeVerification);
        }
        kinds
    }
}

/// Extracts signals using the configured edge header names.
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    edge: EdgeConfig,
}

impl SignalExtractor {
    pub fn new(edge: EdgeConfig) -> Self {
        Self { edge }
    }

    /// Extract every known signal kind from the request.
    pub fn extract(&self, ctx: &RequestContext) -> SignalSet {
        let mut tags = TagSet::new();

        let edge_risk = parse_bounded(
            ctx.header(&self.edge.risk_header),
            99,
            "edge_risk_score_invalid",
            &mut tags,
        );
        let edge_threat = parse_bounded(
            ctx.header(&self.edge.threat_header),
            100,
            "edge_threat_score_invalid",
            &mut tags,
        );

        let verdict = non_empty(ctx.header(&self.edge.verdict_header))
            .and_then(|raw| match parse_verdict(raw) {
                VerdictParse::Parsed(blob) => Some(blob),
                VerdictParse::Unparseable => {
                    tags.push("verdict_blob_unparseable");
                    None
                }
            });

        let waf_flag = ctx
            .header(&self.edge.waf_header)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let proof_header = self
            .edge
            .proof_headers
            .iter()
            .find_map(|name| non_empty(ctx.header(name)))
            .map(|v| v.eq_ignore_ascii_case("passed"));

        let clearance_cookie = ctx.cookie(&self.edge.clearance_cookie).is_some();

        let body = ctx.body.as_ref();
        let proof_reported = body.and_then(|b| b.client_reported_proof_status);
        let opaque_token = body.and_then(|b| {
            non_empty(b.opaque_token.as_deref()).map(|token| OpaqueToken {
                token: token.to_string(),
                expected_action: b.expected_action.clone(),
            })
        });
        let challenge_token =
            body.and_then(|b| non_empty(b.challenge_token.as_deref()).map(str::to_string));

        SignalSet {
            edge_risk,
            edge_threat,
            verdict,
            waf_flag,
            proof_header,
            proof_reported,
            clearance_cookie,
            user_agent: ctx.user_agent().unwrap_or_default().to_string(),
            opaque_token,
            challenge_token,
            tags,
        }
    }
}

/// Parse an integer header within `[0, max]`; anything else is absent.
fn parse_bounded(
    raw: Option<&str>,
    max: u8,
    invalid_tag: &str,
    tags: &mut TagSet,
) -> Option<u8> {
    let raw = non_empty(raw)?;
    match raw.parse::<u8>() {
        Ok(value) if value <= max => Some(value),
        _ => {
            tags.push(invalid_tag);
            None
        }
    }
}

/// Short SHA-256 fingerprint of a token, safe to log.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
