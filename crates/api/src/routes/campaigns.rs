//! Route definitions for the `/campaigns` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::campaigns;
use crate::state::AppState;

/// Routes mounted at `/campaigns`.
///
/// ```text
/// POST   /                 -> submit
/// GET    /{id}             -> get_campaign
/// GET    /{id}/recipients  -> list_recipients
/// GET    /{id}/summary     -> get_summary
/// POST   /{id}/pause       -> pause
/// POST   /{id}/resume      -> resume
/// POST   /{id}/cancel      -> cancel
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(campaigns::submit))
        .route("/{id}", get(campaigns::get_campaign))
        .route("/{id}/recipients", get(campaigns::list_recipients))
        .route("/{id}/summary", get(campaigns::get_summary))
        .route("/{id}/pause", post(campaigns::pause))
        .route("/{id}/resume", post(campaigns::resume))
        .route("/{id}/cancel", post(campaigns::cancel))
}
