//! HTTP routes for the Messenger page webhook.
//!
//! - `GET /facebook` answers the platform's subscription handshake
//! - `POST /facebook` receives live deliveries
//! - `POST /test` runs the same pipeline with outbound side effects suppressed
//! - `GET /` lists recently received payloads
//! - `GET /privacy`, `GET /terms` serve the policy pages

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::dispatcher::EventDispatcher;
use crate::pages::{PRIVACY_HTML, TERMS_HTML};
use pagebot_common::logging::generate_trace_id;

/// Number of received payloads kept for `GET /`.
pub const RECENT_UPDATES_LIMIT: usize = 100;

/// Largest accepted webhook body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Header carrying the HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

// ============================================================================
// State
// ============================================================================

/// Shared state for the relay HTTP server.
pub struct RelayState {
    pub dispatcher: Arc<EventDispatcher>,
    /// Token the platform must present during subscription
    pub verify_token: String,
    /// App secret for webhook signature verification
    pub app_secret: Option<Arc<str>>,
    /// Most recent payloads, oldest first
    recent_updates: RwLock<VecDeque<Value>>,
}

impl RelayState {
    async fn record_update(&self, payload: Value) {
        let mut updates = self.recent_updates.write().await;
        if updates.len() == RECENT_UPDATES_LIMIT {
            updates.pop_front();
        }
        updates.push_back(payload);
    }
}

/// Create the relay state.
pub fn create_state(
    dispatcher: Arc<EventDispatcher>,
    verify_token: impl Into<String>,
    app_secret: Option<&str>,
) -> Arc<RelayState> {
    Arc::new(RelayState {
        dispatcher,
        verify_token: verify_token.into(),
        app_secret: app_secret.map(Arc::from),
        recent_updates: RwLock::new(VecDeque::with_capacity(RECENT_UPDATES_LIMIT)),
    })
}

// ============================================================================
// Health / Index
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    sessions: usize,
}

async fn health(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "pagebot-messenger",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.dispatcher.selector().sessions().len(),
    })
}

async fn recent_updates(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    let updates = state.recent_updates.read().await;
    Json(updates.iter().cloned().collect::<Vec<_>>())
}

// ============================================================================
// Webhook Verification
// ============================================================================

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /facebook: subscription handshake
async fn verify_webhook(
    State(state): State<Arc<RelayState>>,
    Query(params): Query<VerifyQuery>,
) -> Response {
    let token_matches = params
        .verify_token
        .as_deref()
        .is_some_and(|t| constant_time_eq(t.as_bytes(), state.verify_token.as_bytes()));

    if params.mode.as_deref() != Some("subscribe") || !token_matches {
        tracing::warn!("Invalid subscribe token");
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    }

    match params.challenge.as_deref().map(str::parse::<i64>) {
        Some(Ok(challenge)) => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        _ => {
            tracing::warn!(challenge = ?params.challenge, "hub.challenge is not an integer");
            (StatusCode::BAD_REQUEST, "Invalid challenge value").into_response()
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verify the `sha256=<hex>` signature of a raw body.
pub fn verify_signature(app_secret: &str, body: &[u8], signature_header: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
}

// ============================================================================
// Deliveries
// ============================================================================

/// POST /facebook
async fn facebook_webhook(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    process_delivery(&state, &headers, &body, false).await
}

/// POST /test
async fn test_webhook(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    process_delivery(&state, &headers, &body, true).await
}

async fn process_delivery(
    state: &RelayState,
    headers: &HeaderMap,
    body: &[u8],
    test_mode: bool,
) -> Response {
    if let Some(ref app_secret) = state.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !verify_signature(app_secret, body, signature) {
            tracing::warn!(
                "Webhook signature verification failed (signature: {})",
                if signature.is_empty() { "missing" } else { "invalid" }
            );
            return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
        }
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Error decoding payload");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    state.record_update(payload.clone()).await;

    let object = payload
        .get("object")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let span = tracing::info_span!("webhook", trace_id = %generate_trace_id(), object = %object, test_mode);

    match state
        .dispatcher
        .dispatch(&payload, test_mode)
        .instrument(span)
        .await
    {
        Ok(_) => (StatusCode::OK, "Webhook processed successfully.\n").into_response(),
        Err(e) => {
            tracing::warn!(object = %object, error = %e, "Dispatch failed");
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, status.canonical_reason().unwrap_or_default()).into_response()
        }
    }
}

// ============================================================================
// Policy Pages
// ============================================================================

async fn privacy() -> Html<&'static str> {
    Html(PRIVACY_HTML)
}

async fn terms() -> Html<&'static str> {
    Html(TERMS_HTML)
}

// ============================================================================
// Router Builder
// ============================================================================

/// Build the relay HTTP router.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/", get(recent_updates))
        .route("/health", get(health))
        .route("/facebook", get(verify_webhook).post(facebook_webhook))
        .route("/test", post(test_webhook))
        .route("/privacy", get(privacy))
        .route("/terms", get(terms))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let body = br#"{"object":"page","entry":[]}"#;
        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
        mac.update(body);
        let header = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_signature("secret", body, &header));
        assert!(!verify_signature("other", body, &header));
        assert!(!verify_signature("secret", body, "sha1=abc"));
        assert!(!verify_signature("secret", body, "sha256=zz"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"token", b"token"));
        assert!(!constant_time_eq(b"token", b"tokem"));
        assert!(!constant_time_eq(b"token", b"tok"));
    }
}
