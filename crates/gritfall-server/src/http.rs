//! HTTP surface: health, diagnostics, join, resubscribe, world reset,
//! effect catalog, and the WebSocket upgrade.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use gritfall_world::config::ResetRequest;

use crate::{ResubscribeRequest, SharedServer};

/// Build the full router.
pub fn router(server: SharedServer) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/diagnostics", get(diagnostics))
        .route("/join", post(join))
        .route("/resubscribe", post(resubscribe))
        .route("/world/reset", post(world_reset))
        .route("/effects/catalog", get(effects_catalog))
        .route("/ws", get(ws_upgrade));
    if server.config.enable_pprof {
        router = router.route("/debug/pprof/trace", get(pprof_trace));
    }
    router.with_state(server)
}

async fn health() -> &'static str {
    "ok"
}

async fn diagnostics(State(server): State<SharedServer>) -> Json<serde_json::Value> {
    Json(server.diagnostics())
}

async fn join(State(server): State<SharedServer>) -> Json<gritfall_proto::server::JoinResponse> {
    Json(server.join())
}

async fn resubscribe(
    State(server): State<SharedServer>,
    Json(request): Json<ResubscribeRequest>,
) -> Json<gritfall_proto::server::StateSnapshot> {
    Json(server.resubscribe(&request))
}

async fn world_reset(
    State(server): State<SharedServer>,
    Json(request): Json<ResetRequest>,
) -> Json<serde_json::Value> {
    let config = server.reset_world(&request);
    Json(serde_json::json!({ "status": "ok", "config": config }))
}

async fn effects_catalog(State(server): State<SharedServer>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "effectCatalog": server.catalog_snapshot() }))
}

/// Profiling stub behind `ENABLE_PPROF_TRACE`; the real trace collection
/// is wired by the deployment, this endpoint just confirms it is on.
async fn pprof_trace() -> &'static str {
    "tracing enabled"
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    id: String,
}

async fn ws_upgrade(
    State(server): State<SharedServer>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // The id must come from a prior /join; unknown ids are refused before
    // the upgrade completes.
    if !server.has_player(&query.id) {
        return (StatusCode::NOT_FOUND, "unknown player id").into_response();
    }
    if server.coordinator.subscriber(&query.id).is_some() {
        return (StatusCode::CONFLICT, "id already connected").into_response();
    }
    ws.on_upgrade(move |socket| crate::session::run(server, socket, query.id))
        .into_response()
}
