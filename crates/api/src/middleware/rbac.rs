//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role is
//! below the minimum with 403 Forbidden. Roles are totally ordered, so a
//! higher role always passes a lower gate.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use relay_core::roles::Role;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

async fn authenticate_with_min(
    parts: &mut Parts,
    state: &AppState,
    min: Role,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    user.context().require(min)?;
    Ok(user)
}

/// Requires at least `viewer`, i.e. any authenticated user.
pub struct RequireViewer(pub AuthUser);

impl FromRequestParts<AppState> for RequireViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate_with_min(parts, state, Role::Viewer)
            .await
            .map(RequireViewer)
    }
}

/// Requires at least `operator`.
pub struct RequireOperator(pub AuthUser);

impl FromRequestParts<AppState> for RequireOperator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate_with_min(parts, state, Role::Operator)
            .await
            .map(RequireOperator)
    }
}

/// Requires at least `admin`.
///
/// ```ignore
/// async fn cancel(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     // user is admin or super_admin here
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate_with_min(parts, state, Role::Admin)
            .await
            .map(RequireAdmin)
    }
}
