use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_channel::ChannelSendError;
use relay_core::error::{CoreError, ValidationReason};
use relay_db::StoreError;
use relay_storage::StagingError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, storage and channel errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent
/// `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `relay_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persistence error from the delivery store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Media validation or upload failure.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The channel refused or could not take a direct send.
    #[error(transparent)]
    Channel(#[from] ChannelSendError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// Status, machine code, message and (for validation failures) reason.
type Classified = (StatusCode, &'static str, String, Option<ValidationReason>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, reason) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Store(store) => classify_store_error(store),

            AppError::Staging(StagingError::Validation(core)) => classify_core_error(core),
            AppError::Staging(StagingError::Upload(err)) => {
                tracing::error!(error = %err, "Media upload failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPLOAD_ERROR",
                    "Media upload failed".to_string(),
                    None,
                )
            }

            AppError::Channel(err) if err.is_transient() => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CHANNEL_UNAVAILABLE",
                err.message().to_string(),
                None,
            ),
            AppError::Channel(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CHANNEL_REJECTED",
                err.recipient_annotation(),
                None,
            ),

            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(reason) = reason {
            body["reason"] = json!(reason);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> Classified {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
        None,
    )
}

fn classify_core_error(core: &CoreError) -> Classified {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
            None,
        ),
        CoreError::Validation { reason, message } => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            message.clone(),
            Some(*reason),
        ),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
        CoreError::Unauthorized(msg) => {
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None)
        }
        CoreError::Forbidden { .. } => {
            (StatusCode::FORBIDDEN, "FORBIDDEN", core.to_string(), None)
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn classify_store_error(err: &StoreError) -> Classified {
    match err {
        StoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
            None,
        ),
        StoreError::Database(db) => classify_sqlx_error(db),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> Classified {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
            None,
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                        None,
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
