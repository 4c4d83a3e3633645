//! Repository for the `campaigns` table.

use relay_core::types::{DbId, TenantId, Timestamp};
use sqlx::PgPool;

use crate::models::campaign::{Campaign, NewCampaign};

/// Column list for `campaigns` queries.
const COLUMNS: &str = "\
    id, tenant_id, name, template_name, department_code, submitted_at, created_at";

pub struct CampaignRepo;

impl CampaignRepo {
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        input: &NewCampaign,
    ) -> Result<Campaign, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaigns (tenant_id, name, template_name, department_code) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(&input.template_name)
            .bind(&input.department_code)
            .fetch_one(pool)
            .await
    }

    /// Find a campaign by id, scoped to the tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Set `submitted_at` unless already set. Returns `false` if no row matched.
    pub async fn mark_submitted(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns SET submitted_at = COALESCE(submitted_at, $3) \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
