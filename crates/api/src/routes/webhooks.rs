//! Route definitions for provider callbacks.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /channel          -> receive (signature-authenticated)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/channel", post(webhooks::receive))
}
