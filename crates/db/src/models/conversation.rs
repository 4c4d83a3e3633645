//! Conversations and the outbound messages recorded in them.

use relay_core::types::{DbId, TenantId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `conversations` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Conversation {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub phone: String,
    pub created_at: Timestamp,
}

/// A row from the `conversation_messages` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ConversationMessage {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub conversation_id: DbId,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub provider_message_id: String,
    pub created_at: Timestamp,
}

/// DTO for recording a message the channel accepted.
#[derive(Debug, Clone)]
pub struct NewConversationMessage {
    pub conversation_id: DbId,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub provider_message_id: String,
}
