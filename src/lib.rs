//! Bot-trust evaluation service for Zentinel
//!
//! Decides how much to trust that a request comes from a human, combining
//! edge-provider signals, client proof-of-execution evidence, an external
//! risk assessment and a user-agent heuristic.
//!
//! # Modes
//!
//! - Soft mode: fail-open continuous score in [0, 1] with explanatory tags
//! - Hard mode: fail-closed gate on a single challenge verification
//!
//! Each endpoint is statically bound to one mode.
//!
//! # Example
//!
//! ```ignore
//! use zentinel_bot_trust::{BotTrustConfig, RequestContext, TrustEvaluator};
//!
//! let evaluator = TrustEvaluator::from_config(BotTrustConfig::default())?;
//! let ctx = RequestContext::from_pairs([("cf-bot-score", "87")]);
//! let result = evaluator.evaluate("bot_status", &ctx).await;
//! ```

pub mod assessment;
pub mod config;
pub mod decision;
pub mod error;
pub mod evaluator;
pub mod fusion;
pub mod gate;
pub mod normalize;
pub mod server;
pub mod signals;
pub mod store;
pub mod verification;

pub use assessment::{AssessmentClient, AssessmentRecord, AssessmentResponse, RiskAssessor};
pub use config::{BotTrustConfig, EndpointPolicy, ScoreDirection, TrustMode};
pub use decision::{Decision, EndpointResponse, EvaluationResult, TagSet};
pub use error::{ConfigError, ExternalCallError};
pub use evaluator::TrustEvaluator;
pub use server::{router, AppState};
pub use signals::{EvaluationBody, RequestContext, SignalExtractor, SignalSet};
pub use store::{InMemorySubmissionStore, SubmissionStore};
pub use verification::{ChallengeVerifier, SiteVerifyClient, VerificationResponse};
