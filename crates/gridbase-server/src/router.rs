//! The `CollaborationRouter`, spec §6: a single `/socket` upgrade
//! endpoint. Deployments mount this behind their own gateway, which is
//! expected to have already authenticated the request — the `token`
//! query parameter is handed to [`crate::auth::AuthVerifier`] as a
//! second, optional layer of verification.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::connection::handle_socket;
use crate::state::AppState;

/// Builds the axum [`Router`] exposing `GET /socket` and `GET /health`.
/// Callers nest this under whatever prefix their gateway expects.
#[must_use]
pub fn collaboration_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/socket", get(socket_upgrade))
        .route("/health", get(health))
        .with_state(state)
}

async fn socket_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let token = params.get("token").cloned();
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

/// Liveness probe (C12): never reflects application-level health (no
/// DB ping), only that the process is scheduling requests. Counters
/// come from whatever [`gridbase_domain::ports::MetricsProvider`] was
/// wired at composition time.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let counters = state.metrics.snapshot().await;
    Json(serde_json::json!({
        "status": "ok",
        "counters": counters.into_iter().collect::<HashMap<_, _>>(),
    }))
}
