//! HTTP surface.
//!
//! | Route                       | Endpoint           | Default mode |
//! |-----------------------------|--------------------|--------------|
//! | `GET /api/bot-status`       | `bot_status`       | soft         |
//! | `POST /api/evaluate`        | `evaluate`         | soft         |
//! | `POST /api/contact`         | `contact`          | soft         |
//! | `POST /api/contact-verified`| `contact_verified` | hard         |
//! | `GET /health`               | -                  | -            |

use crate::config::TrustMode;
use crate::decision::EvaluationResult;
use crate::evaluator::TrustEvaluator;
use crate::signals::{EvaluationBody, RequestContext};
use crate::store::{NewSubmission, SubmissionStore};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Names the authoritative signal family on contact responses.
pub const DETECTION_TYPE_HEADER: &str = "x-bot-detection-type";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<TrustEvaluator>,
    pub store: Arc<dyn SubmissionStore>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/bot-status", get(bot_status))
        .route("/api/evaluate", post(evaluate))
        .route("/api/contact", post(contact))
        .route("/api/contact-verified", post(contact_verified))
        .with_state(state)
}

/// Serve the router on an already-bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Bot-trust service listening");
    }
    axum::serve(listener, router(state)).await
}

/// Contact form payload; evidence fields sit beside the form fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactSubmission {
    email: String,
    message: String,
    #[serde(flatten)]
    evidence: EvaluationBody,
}

fn request_context(headers: &HeaderMap, body: Option<EvaluationBody>) -> RequestContext {
    // Values may carry non-ASCII bytes; decode them lossily rather than drop them.
    let decoded: Vec<(&str, Cow<'_, str>)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes())))
        .collect();
    let ctx = RequestContext::from_pairs(decoded.iter().map(|(name, value)| (*name, value.as_ref())));
    match body {
        Some(body) => ctx.with_body(body),
        None => ctx,
    }
}

fn detection_type(mode: TrustMode) -> &'static str {
    match mode {
        TrustMode::Soft => "soft-scoring",
        TrustMode::Hard => "hard-gate",
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn bot_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let endpoint = "bot_status";
    let ctx = request_context(&headers, None);
    let result = state.evaluator.evaluate(endpoint, &ctx).await;
    Json(result.response_for(state.evaluator.mode_for(endpoint))).into_response()
}

async fn evaluate(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let endpoint = "evaluate";
    let evidence = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<EvaluationBody>(&body) {
            Ok(evidence) => Some(evidence),
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable evaluation body");
                None
            }
        }
    };

    let ctx = request_context(&headers, evidence);
    let result = state.evaluator.evaluate(endpoint, &ctx).await;
    Json(result.response_for(state.evaluator.mode_for(endpoint))).into_response()
}

async fn contact(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    submit(&state, "contact", &headers, &body).await
}

async fn contact_verified(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    submit(&state, "contact_verified", &headers, &body).await
}

async fn submit(state: &AppState, endpoint: &str, headers: &HeaderMap, body: &[u8]) -> Response {
    let mode = state.evaluator.mode_for(endpoint);
    let detection_header = (
        HeaderName::from_static(DETECTION_TYPE_HEADER),
        HeaderValue::from_static(detection_type(mode)),
    );

    let submission: ContactSubmission = match serde_json::from_slice(body) {
        Ok(submission) => submission,
        Err(e) => {
            debug!(endpoint = endpoint, error = %e, "Rejecting malformed submission");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request body" })),
            )
                .into_response();
        }
    };

    if submission.email.trim().is_empty() || submission.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Email and message are required" })),
        )
            .into_response();
    }

    let ctx = request_context(headers, Some(submission.evidence));
    let result = state.evaluator.evaluate(endpoint, &ctx).await;

    if !result.is_allowed() {
        return (
            StatusCode::BAD_REQUEST,
            [detection_header],
            Json(json!({
                "error": deny_message(&result),
                "errorCodes": result.error_codes.clone().unwrap_or_default(),
            })),
        )
            .into_response();
    }

    let evaluation = result.response_for(mode);
    let submission_id = state.store.append(NewSubmission {
        email: submission.email,
        message: submission.message,
        user_agent: ctx.user_agent().unwrap_or_default().to_string(),
        endpoint: endpoint.to_string(),
        mode,
        evaluation: result,
    });

    info!(
        endpoint = endpoint,
        mode = mode.as_str(),
        submission_id = submission_id,
        "Submission accepted"
    );

    (
        StatusCode::OK,
        [detection_header],
        Json(json!({
            "success": true,
            "submissionId": submission_id,
            "evaluation": evaluation,
        })),
    )
        .into_response()
}

fn deny_message(result: &EvaluationResult) -> &'static str {
    let required = result
        .error_codes
        .as_deref()
        .is_some_and(|codes| codes.iter().any(|c| c == crate::gate::VERIFICATION_REQUIRED));
    if required {
        "Bot verification required"
    } else {
        "Bot verification failed"
    }
}
