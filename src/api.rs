//! HTTP endpoints for chat turns and automation results.
//!
//! `POST /ingest` hands a turn to the automation engine, `POST /n8n-callback`
//! receives the engine's answer. Both publish to listeners through the
//! dispatcher; the answer never travels back on the ingest response.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::RelayError;
use crate::protocol::{
    present, CallbackRequest, IngestRequest, OutboundTurn, RelayEvent, Role, StatusResponse,
    RELAY_INTERNAL,
};
use crate::sse;
use crate::state::AppState;
use crate::types::new_id;

/// Build the relay router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sse", get(sse::sse_handler))
        .route("/ingest", post(ingest))
        .route("/n8n-callback", post(callback))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn required(value: Option<String>, field: &str) -> Result<String, RelayError> {
    value.ok_or_else(|| RelayError::BadRequest(format!("{} is required", field)))
}

/// Accept a chat turn.
///
/// POST /ingest
///
/// Emits `typing` to the session before the webhook is called, then forwards
/// the turn in the background and answers `202` straight away. A webhook
/// failure reaches listeners as an `error` event. A fault inside the relay
/// while handing the turn over answers `500` and is reported to listeners
/// as `RELAY_INTERNAL`.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusResponse>), RelayError> {
    let Json(req) = payload.map_err(|e| RelayError::BadRequest(e.body_text()))?;

    let session_id = required(present(req.session_id), "session_id")?;
    let text = required(present(req.text), "text")?;
    let message_id = present(req.message_id);

    tracing::info!(session_id = %session_id, message_id = ?message_id, "Ingest turn");

    let turn = OutboundTurn {
        session_id: session_id.clone(),
        text,
        user_id: present(req.user_id),
        message_id: message_id.clone(),
    };

    let handed_over = std::panic::catch_unwind(AssertUnwindSafe(|| {
        state.dispatcher.deliver(
            &session_id,
            &RelayEvent::Typing {
                message_id: message_id.clone(),
            },
        );
        spawn_forward(&state, turn);
    }));

    if handed_over.is_err() {
        tracing::error!(session_id = %session_id, "Ingest panicked while handing over turn");
        state.dispatcher.deliver(
            &session_id,
            &RelayEvent::error(
                RELAY_INTERNAL,
                "relay failed while accepting the message",
                message_id,
            ),
        );
        return Err(RelayError::Internal("failed to accept message".to_string()));
    }

    Ok((StatusCode::ACCEPTED, Json(StatusResponse::accepted())))
}

/// Forward a turn to the automation engine without waiting for it.
///
/// Every outcome other than success is delivered to the session as an
/// `error` event, including a panic inside the automation client.
fn spawn_forward(state: &AppState, turn: OutboundTurn) {
    let automation = state.automation.clone();
    let dispatcher = state.dispatcher.clone();
    let client = automation.name().to_string();

    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(automation.forward(&turn))
            .catch_unwind()
            .await;

        let event = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                tracing::warn!(
                    session_id = %turn.session_id,
                    client = %client,
                    "Automation call failed: {}",
                    e
                );
                RelayEvent::error(e.code(), e.to_string(), turn.message_id.clone())
            }
            Err(_) => {
                tracing::error!(
                    session_id = %turn.session_id,
                    client = %client,
                    "Automation call panicked"
                );
                RelayEvent::error(
                    RELAY_INTERNAL,
                    "relay failed while contacting the automation engine",
                    turn.message_id.clone(),
                )
            }
        };
        dispatcher.deliver(&turn.session_id, &event);
    });
}

/// Receive an asynchronous result from the automation engine.
///
/// POST /n8n-callback
///
/// Responds `404` when nobody is listening on the session; that is an
/// expected outcome (the tab may have closed), not a fault.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, RelayError> {
    let Json(req) = payload.map_err(|e| RelayError::BadRequest(e.body_text()))?;

    let session_id = required(present(req.session_id.clone()), "session_id")?;
    let content = required(req.content_text(), "content")?;
    let message_id = present(req.message_id).unwrap_or_else(new_id);

    let event = if req.partial {
        RelayEvent::Chunk {
            role: Role::Assistant,
            content,
            message_id,
        }
    } else {
        RelayEvent::Final {
            role: Role::Assistant,
            content,
            message_id,
        }
    };

    let recipients = state.dispatcher.deliver(&session_id, &event);
    if recipients == 0 {
        tracing::info!(session_id = %session_id, "Callback result has no active listener");
        return Err(RelayError::NoListener);
    }

    Ok(Json(StatusResponse::sent_to_client(recipients)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub streams: usize,
    pub automation: String,
    pub started_at: String,
    pub server_now: String,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.registry.session_count(),
        streams: state.registry.total_streams(),
        automation: state.automation.name().to_string(),
        started_at: state.started_at.to_rfc3339(),
        server_now: chrono::Utc::now().to_rfc3339(),
    })
}
