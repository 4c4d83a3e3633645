//! Campaign entity.

use relay_core::types::{DbId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `campaigns` table.
///
/// Status is not stored; it is derived from `submitted_at` and the
/// recipient timelines.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Campaign {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub name: String,
    pub template_name: String,
    pub department_code: Option<String>,
    pub submitted_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Campaign {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// DTO for creating a campaign. Tenant comes from the request context.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub template_name: String,
    pub department_code: Option<String>,
}
