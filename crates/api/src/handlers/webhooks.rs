//! Inbound delivery notifications from the channel provider.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use relay_core::error::CoreError;
use relay_core::webhook::{verify_signature, SIGNATURE_HEADER};

use crate::engine::IngestReport;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/webhooks/channel
///
/// Authenticated by an HMAC signature over the raw body. Individual events
/// that cannot be applied are audited and counted, not failed. The batch
/// answers 503 when any event could not reach the store or names a provider
/// message id that is not recorded yet, so the provider redelivers; replays
/// are harmless because merges are idempotent.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<DataResponse<IngestReport>>)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CoreError::Unauthorized("Missing webhook signature".into()))?;

    if !verify_signature(&state.config.webhook_secret, &body, signature) {
        tracing::warn!(target: "audit", "Webhook rejected: invalid signature");
        return Err(CoreError::Unauthorized("Invalid webhook signature".into()).into());
    }

    let report = state
        .ingestor
        .ingest_body(&body)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let status = if report.failed > 0 || report.deferred > 0 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DataResponse { data: report })))
}
