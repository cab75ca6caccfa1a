//! HTTP routing
//!
//! Three surfaces: the realtime channel upgrade, a plain status read of the
//! counter, and a 404 for everything else.

use axum::extract::{State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::counter::CounterActor;
use crate::ws;

/// Build the server router
pub fn build_router(actor: CounterActor) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/count", get(read_count))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(actor)
}

async fn ws_handler(
    State(actor): State<CounterActor>,
    headers: HeaderMap,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    let Some(upgrade) = upgrade else {
        return (StatusCode::UPGRADE_REQUIRED, "WebSocket upgrade required").into_response();
    };

    let identity = client_identity(&headers);
    upgrade.on_upgrade(move |socket| ws::handle_socket(socket, actor, identity))
}

/// Plain status read: no mutation, no rate limiting. A genuine storage
/// failure surfaces here instead of being masked as a zero count.
async fn read_count(State(actor): State<CounterActor>) -> Response {
    match actor.read_count().await {
        Ok(value) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            value.to_string(),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to read counter value");
            (StatusCode::INTERNAL_SERVER_ERROR, "counter unavailable").into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Rate-limit identity for a request: the first address in the forwarded
/// header, or "unknown". Best-effort and spoofable; never treated as
/// authentication.
fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
