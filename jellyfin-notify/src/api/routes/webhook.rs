//! Jellyfin webhook intake.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Serialize;
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::ingest::AdmitOutcome;

/// Header carrying the shared webhook secret.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Acknowledgment returned for every well-formed event.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    /// `accepted`, `duplicate` or `ignored`.
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&AdmitOutcome> for WebhookResponse {
    fn from(outcome: &AdmitOutcome) -> Self {
        let reason = match outcome {
            AdmitOutcome::Rejected(reason) => Some(reason.to_string()),
            _ => None,
        };
        Self {
            status: "ok",
            outcome: outcome.as_str(),
            reason,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive_webhook))
}

/// Authenticate, parse and admit one webhook. Broadcasting happens after the
/// response is sent.
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    if !secret_matches(&state.webhook_secret, &headers) {
        warn!("Webhook rejected: secret mismatch");
        return Err(ApiError::unauthorized("Invalid webhook secret"));
    }

    let outcome = state.gate.admit_raw(&body).await?;
    Ok(Json(WebhookResponse::from(&outcome)))
}

/// An empty configured secret disables the check.
fn secret_matches(expected: &str, headers: &HeaderMap) -> bool {
    if expected.is_empty() {
        return true;
    }
    headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| constant_time_eq(provided.as_bytes(), expected.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
