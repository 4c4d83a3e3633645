//! Handlers for the `/campaigns` resource.
//!
//! Submission starts a background dispatch; the read endpoints derive
//! status and counts from the stored recipients on every call.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use relay_core::campaign::CampaignSummary;
use relay_core::types::DbId;
use relay_db::models::campaign::Campaign;
use relay_db::models::recipient::RecipientView;
use serde::Serialize;

use crate::engine::{CampaignDetail, CampaignSubmission, DispatchAction, DispatchStatus};
use crate::error::AppResult;
use crate::middleware::rbac::{RequireAdmin, RequireOperator, RequireViewer};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmittedCampaign {
    pub campaign: Campaign,
    /// Distinct recipients created for the campaign.
    pub recipients: usize,
    pub dispatch: DispatchStatus,
}

// ---------------------------------------------------------------------------
// Submission and reads
// ---------------------------------------------------------------------------

/// POST /api/v1/campaigns
///
/// Create the campaign with one `queued` recipient per distinct phone and
/// start dispatching. Returns 201 once the rows exist.
pub async fn submit(
    RequireOperator(user): RequireOperator,
    State(state): State<AppState>,
    Json(input): Json<CampaignSubmission>,
) -> AppResult<(StatusCode, Json<DataResponse<SubmittedCampaign>>)> {
    let ctx = user.context();
    let (campaign, handle) = state.dispatcher.submit(&ctx, &input).await?;
    let recipients = state
        .store
        .list_recipients(ctx.tenant_id, campaign.id)
        .await?
        .len();

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedCampaign {
                campaign,
                recipients,
                dispatch: handle.status(),
            },
        }),
    ))
}

/// GET /api/v1/campaigns/{id}
pub async fn get_campaign(
    RequireViewer(user): RequireViewer,
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<DataResponse<CampaignDetail>>> {
    let detail = state
        .aggregator
        .get_campaign(&user.context(), campaign_id)
        .await?;
    Ok(Json(DataResponse { data: detail }))
}

/// GET /api/v1/campaigns/{id}/recipients
pub async fn list_recipients(
    RequireViewer(user): RequireViewer,
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<RecipientView>>>> {
    let recipients = state
        .aggregator
        .list_recipients(&user.context(), campaign_id)
        .await?;
    Ok(Json(DataResponse { data: recipients }))
}

/// GET /api/v1/campaigns/{id}/summary
///
/// Counts are recomputed from the recipients, never read from a cache.
pub async fn get_summary(
    RequireViewer(user): RequireViewer,
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<DataResponse<CampaignSummary>>> {
    let summary = state
        .aggregator
        .summarize(&user.context(), campaign_id)
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

// ---------------------------------------------------------------------------
// Dispatch control
// ---------------------------------------------------------------------------

/// POST /api/v1/campaigns/{id}/pause
pub async fn pause(
    RequireOperator(user): RequireOperator,
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<DataResponse<DispatchStatus>>> {
    let status = state
        .dispatcher
        .control(&user.context(), campaign_id, DispatchAction::Pause)
        .await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/campaigns/{id}/resume
pub async fn resume(
    RequireOperator(user): RequireOperator,
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<DataResponse<DispatchStatus>>> {
    let status = state
        .dispatcher
        .control(&user.context(), campaign_id, DispatchAction::Resume)
        .await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/campaigns/{id}/cancel
///
/// Admin only. Recipients not yet handed to the channel end as `failed`
/// with a cancellation message; sends already in flight complete.
pub async fn cancel(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<DataResponse<DispatchStatus>>> {
    let status = state
        .dispatcher
        .control(&user.context(), campaign_id, DispatchAction::Cancel)
        .await?;
    Ok(Json(DataResponse { data: status }))
}
