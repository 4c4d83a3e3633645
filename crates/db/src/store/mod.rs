//! The storage seam used by the dispatch engine, the webhook ingestor and
//! the query surface.
//!
//! Every method takes the tenant explicitly. Lookups by id never return a
//! row owned by another tenant; the one exception is [`DeliveryStore::apply_event`],
//! which resolves the recipient first and reports a mismatch instead of
//! silently ignoring it.

use async_trait::async_trait;
use relay_core::delivery::DeliveryEvent;
use relay_core::types::{DbId, TenantId, Timestamp};
use relay_core::webhook::RecipientRef;

use crate::models::audit::NewWebhookAudit;
use crate::models::campaign::{Campaign, NewCampaign};
use crate::models::channel_account::ChannelAccount;
use crate::models::conversation::{Conversation, ConversationMessage, NewConversationMessage};
use crate::models::recipient::Recipient;

pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },
}

/// Result of merging one delivery event into a stored recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record changed; carries the updated row.
    Applied(Recipient),
    /// The event was already reflected; the row is untouched.
    Unchanged(Recipient),
    /// The recipient exists but belongs to another tenant. Nothing was written.
    TenantMismatch { stored_tenant: TenantId },
    /// No recipient matches the reference.
    UnknownRecipient,
}

impl MergeOutcome {
    pub fn recipient(&self) -> Option<&Recipient> {
        match self {
            Self::Applied(r) | Self::Unchanged(r) => Some(r),
            Self::TenantMismatch { .. } | Self::UnknownRecipient => None,
        }
    }
}

#[async_trait]
pub trait DeliveryStore: Send + Sync + 'static {
    /// Prove the backing store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;

    // -- campaigns ----------------------------------------------------------

    async fn create_campaign(
        &self,
        tenant_id: TenantId,
        input: &NewCampaign,
    ) -> Result<Campaign, StoreError>;

    async fn find_campaign(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Option<Campaign>, StoreError>;

    /// Record the submission instant. Keeps the first value if called twice.
    async fn mark_campaign_submitted(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    // -- recipients ---------------------------------------------------------

    /// Insert one `queued` recipient per phone, in order. Phones already
    /// present in the campaign are skipped; only new rows are returned.
    async fn insert_recipients(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
        phones: &[String],
    ) -> Result<Vec<Recipient>, StoreError>;

    async fn list_recipients(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Vec<Recipient>, StoreError>;

    async fn find_recipient(
        &self,
        tenant_id: TenantId,
        recipient_id: DbId,
    ) -> Result<Option<Recipient>, StoreError>;

    /// Merge an event into one recipient.
    ///
    /// Concurrent calls for the same recipient are serialized so the
    /// read-merge-write cycle never loses an update.
    async fn apply_event(
        &self,
        tenant_id: TenantId,
        target: &RecipientRef,
        event: &DeliveryEvent,
    ) -> Result<MergeOutcome, StoreError>;

    /// Attach the provider message id and merge a `sent` event at `at`,
    /// atomically.
    async fn record_sent(
        &self,
        tenant_id: TenantId,
        recipient_id: DbId,
        provider_message_id: &str,
        at: Timestamp,
    ) -> Result<MergeOutcome, StoreError>;

    // -- conversations ------------------------------------------------------

    async fn find_conversation(
        &self,
        tenant_id: TenantId,
        conversation_id: DbId,
    ) -> Result<Option<Conversation>, StoreError>;

    async fn insert_conversation_message(
        &self,
        tenant_id: TenantId,
        input: &NewConversationMessage,
    ) -> Result<ConversationMessage, StoreError>;

    // -- channel credentials ------------------------------------------------

    async fn find_channel_account(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<ChannelAccount>, StoreError>;

    // -- audit --------------------------------------------------------------

    async fn record_webhook_audit(&self, entry: &NewWebhookAudit) -> Result<(), StoreError>;
}
