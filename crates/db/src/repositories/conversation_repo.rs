//! Repository for the `conversations` and `conversation_messages` tables.

use relay_core::types::{DbId, TenantId};
use sqlx::PgPool;

use crate::models::conversation::{Conversation, ConversationMessage, NewConversationMessage};

const COLUMNS: &str = "id, tenant_id, phone, created_at";

const MESSAGE_COLUMNS: &str = "\
    id, tenant_id, conversation_id, body, media_url, media_type, \
    provider_message_id, created_at";

pub struct ConversationRepo;

impl ConversationRepo {
    /// Find or create the conversation for a phone.
    pub async fn upsert(
        pool: &PgPool,
        tenant_id: TenantId,
        phone: &str,
    ) -> Result<Conversation, sqlx::Error> {
        let query = format!(
            "INSERT INTO conversations (tenant_id, phone) VALUES ($1, $2) \
             ON CONFLICT (tenant_id, phone) DO UPDATE SET phone = EXCLUDED.phone \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Conversation>(&query)
            .bind(tenant_id)
            .bind(phone)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM conversations WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, Conversation>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn insert_message(
        pool: &PgPool,
        tenant_id: TenantId,
        input: &NewConversationMessage,
    ) -> Result<ConversationMessage, sqlx::Error> {
        let query = format!(
            "INSERT INTO conversation_messages \
                (tenant_id, conversation_id, body, media_url, media_type, provider_message_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        sqlx::query_as::<_, ConversationMessage>(&query)
            .bind(tenant_id)
            .bind(input.conversation_id)
            .bind(&input.body)
            .bind(&input.media_url)
            .bind(&input.media_type)
            .bind(&input.provider_message_id)
            .fetch_one(pool)
            .await
    }

    pub async fn list_messages(
        pool: &PgPool,
        tenant_id: TenantId,
        conversation_id: DbId,
    ) -> Result<Vec<ConversationMessage>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM conversation_messages \
             WHERE tenant_id = $1 AND conversation_id = $2 \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, ConversationMessage>(&query)
            .bind(tenant_id)
            .bind(conversation_id)
            .fetch_all(pool)
            .await
    }
}
