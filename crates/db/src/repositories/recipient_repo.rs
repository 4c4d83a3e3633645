//! Repository for the `campaign_recipients` table.
//!
//! Delivery timestamps are never written directly from callers. Every
//! change goes through [`RecipientRepo::merge_event`], which locks the row,
//! merges in Rust with the shared timeline rule, and writes the result back
//! inside one transaction.

use relay_core::delivery::DeliveryEvent;
use relay_core::types::{DbId, TenantId};
use relay_core::webhook::RecipientRef;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::recipient::Recipient;
use crate::store::MergeOutcome;

/// Column list for `campaign_recipients` queries.
const COLUMNS: &str = "\
    id, tenant_id, campaign_id, phone, provider_message_id, \
    sent_at, delivered_at, read_at, replied_at, failed_at, error_message, \
    created_at, updated_at";

pub struct RecipientRepo;

impl RecipientRepo {
    /// Insert one row per phone in submission order, skipping phones the
    /// campaign already has. Returns only the new rows, ordered by id.
    pub async fn insert_batch(
        pool: &PgPool,
        tenant_id: TenantId,
        campaign_id: DbId,
        phones: &[String],
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        if phones.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "INSERT INTO campaign_recipients (tenant_id, campaign_id, phone) \
             SELECT $1, $2, p.phone \
             FROM UNNEST($3::text[]) WITH ORDINALITY AS p(phone, ord) \
             ORDER BY p.ord \
             ON CONFLICT (campaign_id, phone) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let mut rows = sqlx::query_as::<_, Recipient>(&query)
            .bind(tenant_id)
            .bind(campaign_id)
            .bind(phones)
            .fetch_all(pool)
            .await?;
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    pub async fn list_by_campaign(
        pool: &PgPool,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaign_recipients \
             WHERE tenant_id = $1 AND campaign_id = $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, Recipient>(&query)
            .bind(tenant_id)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<Recipient>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaign_recipients WHERE id = $1 AND tenant_id = $2"
        );
        sqlx::query_as::<_, Recipient>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Merge one event into a recipient under `SELECT ... FOR UPDATE`.
    ///
    /// The row is located without a tenant filter so a mismatch can be
    /// reported; nothing is written in that case. `provider_message_id`
    /// is attached only if the row has none yet.
    pub async fn merge_event(
        pool: &PgPool,
        tenant_id: TenantId,
        target: &RecipientRef,
        event: &DeliveryEvent,
        provider_message_id: Option<&str>,
    ) -> Result<MergeOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(mut recipient) = Self::lock_row(&mut tx, target).await? else {
            return Ok(MergeOutcome::UnknownRecipient);
        };
        if recipient.tenant_id != tenant_id {
            return Ok(MergeOutcome::TenantMismatch {
                stored_tenant: recipient.tenant_id,
            });
        }

        let mut timeline = recipient.timeline();
        let mut changed = timeline.apply(event);
        if let Some(message_id) = provider_message_id {
            if recipient.provider_message_id.is_none() {
                recipient.provider_message_id = Some(message_id.to_string());
                changed = true;
            }
        }
        if !changed {
            tx.commit().await?;
            return Ok(MergeOutcome::Unchanged(recipient));
        }
        recipient.set_timeline(timeline);

        let query = format!(
            "UPDATE campaign_recipients SET \
                provider_message_id = $2, \
                sent_at = $3, delivered_at = $4, read_at = $5, replied_at = $6, \
                failed_at = $7, error_message = $8, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Recipient>(&query)
            .bind(recipient.id)
            .bind(&recipient.provider_message_id)
            .bind(recipient.sent_at)
            .bind(recipient.delivered_at)
            .bind(recipient.read_at)
            .bind(recipient.replied_at)
            .bind(recipient.failed_at)
            .bind(&recipient.error_message)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(MergeOutcome::Applied(updated))
    }

    async fn lock_row(
        tx: &mut Transaction<'_, Postgres>,
        target: &RecipientRef,
    ) -> Result<Option<Recipient>, sqlx::Error> {
        match target {
            RecipientRef::Id(id) => {
                let query =
                    format!("SELECT {COLUMNS} FROM campaign_recipients WHERE id = $1 FOR UPDATE");
                sqlx::query_as::<_, Recipient>(&query)
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await
            }
            RecipientRef::ProviderMessage(message_id) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM campaign_recipients \
                     WHERE provider_message_id = $1 FOR UPDATE"
                );
                sqlx::query_as::<_, Recipient>(&query)
                    .bind(message_id)
                    .fetch_optional(&mut **tx)
                    .await
            }
        }
    }
}
