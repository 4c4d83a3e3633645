//! Postgres-backed [`DeliveryStore`], delegating to the repositories.

use async_trait::async_trait;
use relay_core::delivery::{DeliveryEvent, DeliveryEventKind};
use relay_core::types::{DbId, TenantId, Timestamp};
use relay_core::webhook::RecipientRef;

use super::{DeliveryStore, MergeOutcome, StoreError};
use crate::models::audit::NewWebhookAudit;
use crate::models::campaign::{Campaign, NewCampaign};
use crate::models::channel_account::ChannelAccount;
use crate::models::conversation::{Conversation, ConversationMessage, NewConversationMessage};
use crate::models::recipient::Recipient;
use crate::repositories::{
    CampaignRepo, ChannelAccountRepo, ConversationRepo, RecipientRepo, WebhookAuditRepo,
};
use crate::DbPool;

#[derive(Clone)]
pub struct PgDeliveryStore {
    pool: DbPool,
}

impl PgDeliveryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryStore for PgDeliveryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_campaign(
        &self,
        tenant_id: TenantId,
        input: &NewCampaign,
    ) -> Result<Campaign, StoreError> {
        Ok(CampaignRepo::create(&self.pool, tenant_id, input).await?)
    }

    async fn find_campaign(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Option<Campaign>, StoreError> {
        Ok(CampaignRepo::find_by_id(&self.pool, tenant_id, campaign_id).await?)
    }

    async fn mark_campaign_submitted(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        if CampaignRepo::mark_submitted(&self.pool, tenant_id, campaign_id, at).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "Campaign",
                id: campaign_id,
            })
        }
    }

    async fn insert_recipients(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
        phones: &[String],
    ) -> Result<Vec<Recipient>, StoreError> {
        Ok(RecipientRepo::insert_batch(&self.pool, tenant_id, campaign_id, phones).await?)
    }

    async fn list_recipients(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Vec<Recipient>, StoreError> {
        Ok(RecipientRepo::list_by_campaign(&self.pool, tenant_id, campaign_id).await?)
    }

    async fn find_recipient(
        &self,
        tenant_id: TenantId,
        recipient_id: DbId,
    ) -> Result<Option<Recipient>, StoreError> {
        Ok(RecipientRepo::find_by_id(&self.pool, tenant_id, recipient_id).await?)
    }

    async fn apply_event(
        &self,
        tenant_id: TenantId,
        target: &RecipientRef,
        event: &DeliveryEvent,
    ) -> Result<MergeOutcome, StoreError> {
        Ok(RecipientRepo::merge_event(&self.pool, tenant_id, target, event, None).await?)
    }

    async fn record_sent(
        &self,
        tenant_id: TenantId,
        recipient_id: DbId,
        provider_message_id: &str,
        at: Timestamp,
    ) -> Result<MergeOutcome, StoreError> {
        Ok(RecipientRepo::merge_event(
            &self.pool,
            tenant_id,
            &RecipientRef::Id(recipient_id),
            &DeliveryEvent::new(DeliveryEventKind::Sent, at),
            Some(provider_message_id),
        )
        .await?)
    }

    async fn find_conversation(
        &self,
        tenant_id: TenantId,
        conversation_id: DbId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(ConversationRepo::find_by_id(&self.pool, tenant_id, conversation_id).await?)
    }

    async fn insert_conversation_message(
        &self,
        tenant_id: TenantId,
        input: &NewConversationMessage,
    ) -> Result<ConversationMessage, StoreError> {
        Ok(ConversationRepo::insert_message(&self.pool, tenant_id, input).await?)
    }

    async fn find_channel_account(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<ChannelAccount>, StoreError> {
        Ok(ChannelAccountRepo::find_by_tenant(&self.pool, tenant_id).await?)
    }

    async fn record_webhook_audit(&self, entry: &NewWebhookAudit) -> Result<(), StoreError> {
        WebhookAuditRepo::insert(&self.pool, entry).await?;
        Ok(())
    }
}
