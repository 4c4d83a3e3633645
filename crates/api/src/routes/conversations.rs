//! Route definitions for the `/conversations` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use relay_core::media::MAX_MEDIA_BYTES;

use crate::handlers::conversations;
use crate::state::AppState;

/// Body limit for the media route. Leaves room above the attachment
/// ceiling so oversized files reach validation and get a typed rejection.
const MEDIA_BODY_LIMIT: usize = 2 * MAX_MEDIA_BYTES as usize;

/// Routes mounted at `/conversations`.
///
/// ```text
/// POST   /{id}/messages    -> send_text
/// POST   /{id}/media       -> send_media (multipart)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/messages", post(conversations::send_text))
        .route(
            "/{id}/media",
            post(conversations::send_media).layer(DefaultBodyLimit::max(MEDIA_BODY_LIMIT)),
        )
}
