pub mod campaigns;
pub mod conversations;
pub mod health;
pub mod webhooks;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws/campaigns/{id}                  live recipient changes (WebSocket)
///
/// /campaigns                          submit (operator)
/// /campaigns/{id}                     detail with derived status (viewer)
/// /campaigns/{id}/recipients          recipients with state (viewer)
/// /campaigns/{id}/summary             per-state counts (viewer)
/// /campaigns/{id}/pause               pause dispatch (operator)
/// /campaigns/{id}/resume              resume dispatch (operator)
/// /campaigns/{id}/cancel              cancel dispatch (admin)
///
/// /conversations/{id}/messages        direct text send (operator)
/// /conversations/{id}/media           multipart media send (operator)
///
/// /webhooks/channel                   provider delivery notifications (signed)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoint.
        .route("/ws/campaigns/{id}", get(ws::campaign_ws_handler))
        // Campaign submission, reads and dispatch control.
        .nest("/campaigns", campaigns::router())
        // Direct sends.
        .nest("/conversations", conversations::router())
        // Provider callbacks.
        .nest("/webhooks", webhooks::router())
}
