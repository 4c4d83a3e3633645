//! Handlers for direct sends into a conversation.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use relay_core::error::{CoreError, ValidationReason};
use relay_core::media::MAX_MEDIA_BYTES;
use relay_core::types::DbId;
use relay_db::models::conversation::ConversationMessage;
use relay_storage::MediaUpload;
use serde::Deserialize;

use crate::engine::SentMedia;
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireOperator;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for a text message.
#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    pub body: String,
}

/// POST /api/v1/conversations/{id}/messages
pub async fn send_text(
    RequireOperator(user): RequireOperator,
    State(state): State<AppState>,
    Path(conversation_id): Path<DbId>,
    Json(input): Json<SendTextRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ConversationMessage>>)> {
    let message = state
        .conversations
        .send_text(&user.context(), conversation_id, &input.body)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: message })))
}

/// POST /api/v1/conversations/{id}/media
///
/// Multipart form with a required `file` part and an optional `caption`.
/// The file is validated before anything is stored or sent.
pub async fn send_media(
    RequireOperator(user): RequireOperator,
    State(state): State<AppState>,
    Path(conversation_id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SentMedia>>)> {
    let mut upload: Option<MediaUpload> = None;
    let mut caption: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("attachment").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(MediaUpload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "caption" => {
                caption = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {} // ignore unknown fields
        }
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;

    let sent = state
        .conversations
        .send_media(&user.context(), conversation_id, upload, caption)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: sent })))
}

/// An oversized body is reported like any other too-large attachment.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return CoreError::validation(
            ValidationReason::TooLarge,
            format!("Attachment exceeds the {MAX_MEDIA_BYTES} byte limit"),
        )
        .into();
    }
    AppError::BadRequest(err.body_text())
}
