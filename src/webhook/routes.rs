//! HTTP endpoints for provider callbacks.
//!
//! - `POST /webhook`: authenticated callback ingestion
//! - `GET /webhook`: provider subscription handshake
//! - `GET /health`

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use super::dispatch::WebhookDispatcher;
use crate::error::WebhookError;

/// Shared state for webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<WebhookDispatcher>,
    /// Secret every callback must present.
    pub auth_token: SecretString,
    /// Expected `hub.verify_token` during the subscription handshake.
    pub verify_token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Build the webhook router.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_subscription).post(receive_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "delivery-hook"
    }))
}

/// Token from `Authorization: Bearer <token>`, or the `token` query parameter.
fn presented_token<'a>(headers: &'a HeaderMap, query: &'a TokenQuery) -> Option<&'a str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or(query.token.as_deref())
        .map(str::trim)
}

fn is_authorized(expected: &SecretString, presented: Option<&str>) -> bool {
    let expected = expected.expose_secret();
    !expected.is_empty() && presented == Some(expected)
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

/// POST /webhook
///
/// Unrecognised payloads get 400. Everything else is acknowledged with 200;
/// reconciliation failures are logged for alerting.
async fn receive_webhook(
    State(state): State<WebhookState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !is_authorized(&state.auth_token, presented_token(&headers, &query)) {
        warn!("Webhook rejected: bad or missing token");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "invalid webhook token");
    }

    let payload: Value = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON");
            return error_response(StatusCode::BAD_REQUEST, "malformed", "body is not valid JSON");
        }
    };

    match state.dispatcher.dispatch(&payload).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "accepted" }))).into_response(),
        Err(WebhookError::Malformed { reason }) => {
            error_response(StatusCode::BAD_REQUEST, "malformed", &reason)
        }
        Err(e) => {
            error!(error = %e, "Webhook processing failed");
            (StatusCode::OK, Json(json!({ "status": "accepted" }))).into_response()
        }
    }
}

/// GET /webhook
///
/// Echoes `hub.challenge` when the provider presents the configured verify token.
async fn verify_subscription(
    State(state): State<WebhookState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let expected = state
        .verify_token
        .as_ref()
        .map(|t| t.expose_secret().trim())
        .unwrap_or("");
    let observed = query.verify_token.as_deref().map(str::trim).unwrap_or("");

    if query.mode.as_deref() == Some("subscribe") && !expected.is_empty() && observed == expected
    {
        return (StatusCode::OK, query.challenge.unwrap_or_default()).into_response();
    }

    warn!("Webhook subscription verification failed");
    error_response(
        StatusCode::FORBIDDEN,
        "invalid_verification",
        "webhook verification failed",
    )
}
