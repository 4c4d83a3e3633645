//! Repository for the `channel_accounts` table.

use relay_core::types::TenantId;
use sqlx::PgPool;

use crate::models::channel_account::ChannelAccount;

const COLUMNS: &str = "tenant_id, phone_number_id, access_token, created_at, updated_at";

pub struct ChannelAccountRepo;

impl ChannelAccountRepo {
    pub async fn find_by_tenant(
        pool: &PgPool,
        tenant_id: TenantId,
    ) -> Result<Option<ChannelAccount>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM channel_accounts WHERE tenant_id = $1");
        sqlx::query_as::<_, ChannelAccount>(&query)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace a tenant's credentials.
    pub async fn upsert(
        pool: &PgPool,
        tenant_id: TenantId,
        phone_number_id: &str,
        access_token: &str,
    ) -> Result<ChannelAccount, sqlx::Error> {
        let query = format!(
            "INSERT INTO channel_accounts (tenant_id, phone_number_id, access_token) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (tenant_id) DO UPDATE \
             SET phone_number_id = EXCLUDED.phone_number_id, \
                 access_token = EXCLUDED.access_token, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChannelAccount>(&query)
            .bind(tenant_id)
            .bind(phone_number_id)
            .bind(access_token)
            .fetch_one(pool)
            .await
    }
}
