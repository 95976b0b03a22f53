//! HTTP surface — inbound triggers and status.
//!
//! `POST /webhook` is the remote trigger: a JSON body whose `status` field
//! is `"scan"` fires a cycle; anything else is ignored. Per the protocol it
//! always answers 200 OK. `POST /trigger` is the manual entry point (the
//! CLI or any local action), and `GET /status` reports daemon state.

use crate::engine::DisplayState;
use crate::gateway::{CycleState, TriggerGateway, TriggerOrigin, TriggerOutcome};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use facegate_hw::Frame;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
pub struct AppState {
    pub gateway: TriggerGateway,
    pub display: watch::Receiver<DisplayState>,
    pub preview: watch::Receiver<Option<Frame>>,
    pub stage: Arc<CycleState>,
    pub started_at: Instant,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/trigger", post(trigger_handler))
        .route("/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize, Default)]
struct WebhookPayload {
    #[serde(default)]
    status: Option<String>,
}

/// True when the body is a JSON object asking for a scan.
fn wants_scan(body: &[u8]) -> bool {
    serde_json::from_slice::<WebhookPayload>(body)
        .map(|payload| payload.status.as_deref() == Some("scan"))
        .unwrap_or(false)
}

async fn webhook_handler(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    if wants_scan(&body) {
        let outcome = state.gateway.trigger(TriggerOrigin::Remote);
        tracing::debug!(outcome = ?outcome, "webhook scan request");
    } else {
        tracing::debug!(bytes = body.len(), "ignoring unrecognized webhook payload");
    }
    StatusCode::OK
}

async fn trigger_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let outcome = state.gateway.trigger(TriggerOrigin::Manual);
    Json(json!({
        "accepted": outcome == TriggerOutcome::Started,
        "stage": state.stage.current().as_str(),
    }))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let display = state.display.borrow().clone();
    let preview = state.preview.borrow().as_ref().map(|frame| {
        json!({
            "sequence": frame.sequence,
            "width": frame.width,
            "height": frame.height,
            "brightness": frame.avg_brightness(),
        })
    });

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "stage": state.stage.current().as_str(),
        "display": display,
        "preview": preview,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_payload_triggers() {
        assert!(wants_scan(br#"{"status": "scan"}"#));
    }

    #[test]
    fn test_scan_payload_with_extra_fields() {
        assert!(wants_scan(br#"{"status": "scan", "source": "doorbell"}"#));
    }

    #[test]
    fn test_other_status_ignored() {
        assert!(!wants_scan(br#"{"status": "idle"}"#));
    }

    #[test]
    fn test_missing_status_ignored() {
        assert!(!wants_scan(br#"{"message": "hello"}"#));
    }

    #[test]
    fn test_malformed_json_ignored() {
        assert!(!wants_scan(b"status=scan"));
        assert!(!wants_scan(b""));
        assert!(!wants_scan(br#"["scan"]"#));
    }
}
