//! Webhook HTTP surface — decodes provider payloads into (phone, text).
//!
//! The route is a thin adapter: it calls the engine's single entry point
//! and returns the reply descriptor as JSON. Mapping the descriptor to an
//! outbound provider message is the delivery collaborator's job.

use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::conversation::ConversationEngine;
use crate::store::UserStore;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub engine: Arc<ConversationEngine>,
    pub users: Arc<UserStore>,
}

/// Inbound WhatsApp payload, provider field names.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body")]
    pub body: String,
}

/// POST /whatsapp — handle one inbound message.
async fn whatsapp(
    State(state): State<WebhookState>,
    Form(message): Form<InboundMessage>,
) -> impl IntoResponse {
    match state.engine.handle_message(&message.from, &message.body).await {
        Ok(reply) => (StatusCode::OK, Json(serde_json::to_value(reply).unwrap_or_default())),
        Err(e) => {
            error!(phone = %message.from, error = %e, "Message handling failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

/// GET /registration/{phone} — whether a phone number is known.
async fn registration(
    State(state): State<WebhookState>,
    Path(phone): Path<String>,
) -> impl IntoResponse {
    match state.users.is_registered(&phone).await {
        Ok(registered) => (
            StatusCode::OK,
            Json(serde_json::json!({"registered": registered})),
        ),
        Err(e) => {
            error!(phone = %phone, error = %e, "Registration lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

/// GET /healthz — liveness probe.
async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// Build the webhook routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/whatsapp", post(whatsapp))
        .route("/registration/{phone}", get(registration))
        .route("/healthz", get(healthz))
        .with_state(state)
}
