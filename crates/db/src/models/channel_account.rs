//! Per-tenant channel credentials.

use relay_core::types::{TenantId, Timestamp};
use sqlx::FromRow;

/// A row from the `channel_accounts` table. Never serialized.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ChannelAccount {
    pub tenant_id: TenantId,
    pub phone_number_id: String,
    pub access_token: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
