//! Repository for the append-only `webhook_audit_logs` table.

use sqlx::PgPool;

use crate::models::audit::{NewWebhookAudit, WebhookAuditLog};

const COLUMNS: &str = "id, tenant_id, outcome, target, reason, payload, created_at";

pub struct WebhookAuditRepo;

impl WebhookAuditRepo {
    pub async fn insert(
        pool: &PgPool,
        entry: &NewWebhookAudit,
    ) -> Result<WebhookAuditLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_audit_logs (tenant_id, outcome, target, reason, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookAuditLog>(&query)
            .bind(entry.tenant_id)
            .bind(entry.outcome.name())
            .bind(&entry.target)
            .bind(&entry.reason)
            .bind(&entry.payload)
            .fetch_one(pool)
            .await
    }

    /// Most recent entries first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<WebhookAuditLog>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM webhook_audit_logs ORDER BY created_at DESC, id DESC LIMIT $1");
        sqlx::query_as::<_, WebhookAuditLog>(&query)
            .bind(limit.clamp(1, 500))
            .fetch_all(pool)
            .await
    }
}
