//! In-process [`DeliveryStore`] used by tests and database-free local runs.
//!
//! All state sits behind one `std::sync::Mutex`. The lock is held only for
//! the synchronous body of each call and never across an `.await`, which
//! also gives the per-recipient serialization `apply_event` requires.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use relay_core::delivery::{DeliveryEvent, DeliveryEventKind};
use relay_core::types::{DbId, TenantId, Timestamp};
use relay_core::webhook::RecipientRef;

use super::{DeliveryStore, MergeOutcome, StoreError};
use crate::models::audit::{NewWebhookAudit, WebhookAuditLog};
use crate::models::campaign::{Campaign, NewCampaign};
use crate::models::channel_account::ChannelAccount;
use crate::models::conversation::{Conversation, ConversationMessage, NewConversationMessage};
use crate::models::recipient::Recipient;

#[derive(Default)]
struct State {
    next_id: DbId,
    campaigns: BTreeMap<DbId, Campaign>,
    recipients: BTreeMap<DbId, Recipient>,
    by_provider_message: HashMap<String, DbId>,
    conversations: BTreeMap<DbId, Conversation>,
    messages: Vec<ConversationMessage>,
    channel_accounts: HashMap<TenantId, ChannelAccount>,
    audits: Vec<WebhookAuditLog>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryDeliveryStore {
    state: Mutex<State>,
}

impl MemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a half-written row:
        // every mutation is a single insert or field assignment.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a conversation row. Conversations are owned by the wider
    /// product; this exists so tests and local runs can seed them.
    pub fn insert_conversation(&self, tenant_id: TenantId, phone: &str) -> Conversation {
        let mut state = self.lock();
        let id = state.next_id();
        let conversation = Conversation {
            id,
            tenant_id,
            phone: phone.to_string(),
            created_at: Utc::now(),
        };
        state.conversations.insert(id, conversation.clone());
        conversation
    }

    /// Register channel credentials for a tenant.
    pub fn insert_channel_account(
        &self,
        tenant_id: TenantId,
        phone_number_id: &str,
        access_token: &str,
    ) {
        let now = Utc::now();
        self.lock().channel_accounts.insert(
            tenant_id,
            ChannelAccount {
                tenant_id,
                phone_number_id: phone_number_id.to_string(),
                access_token: access_token.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Snapshot of every audit entry recorded so far.
    pub fn webhook_audits(&self) -> Vec<WebhookAuditLog> {
        self.lock().audits.clone()
    }

    /// Snapshot of every message recorded in a conversation.
    pub fn conversation_messages(&self, conversation_id: DbId) -> Vec<ConversationMessage> {
        self.lock()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    fn merge(
        &self,
        tenant_id: TenantId,
        target: &RecipientRef,
        event: &DeliveryEvent,
        provider_message_id: Option<&str>,
    ) -> MergeOutcome {
        let mut state = self.lock();

        let id = match target {
            RecipientRef::Id(id) => Some(*id),
            RecipientRef::ProviderMessage(message_id) => {
                state.by_provider_message.get(message_id).copied()
            }
        };
        let recipient = match id {
            Some(id) => state.recipients.get_mut(&id),
            None => None,
        };
        let Some(recipient) = recipient else {
            return MergeOutcome::UnknownRecipient;
        };
        if recipient.tenant_id != tenant_id {
            return MergeOutcome::TenantMismatch {
                stored_tenant: recipient.tenant_id,
            };
        }

        let mut timeline = recipient.timeline();
        let mut changed = timeline.apply(event);
        let mut new_message_id = None;
        if let Some(message_id) = provider_message_id {
            if recipient.provider_message_id.is_none() {
                recipient.provider_message_id = Some(message_id.to_string());
                new_message_id = Some((message_id.to_string(), recipient.id));
                changed = true;
            }
        }
        if !changed {
            return MergeOutcome::Unchanged(recipient.clone());
        }

        recipient.set_timeline(timeline);
        recipient.updated_at = Utc::now();
        let updated = recipient.clone();
        if let Some((message_id, id)) = new_message_id {
            state.by_provider_message.insert(message_id, id);
        }
        MergeOutcome::Applied(updated)
    }
}

#[async_trait]
impl DeliveryStore for MemoryDeliveryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_campaign(
        &self,
        tenant_id: TenantId,
        input: &NewCampaign,
    ) -> Result<Campaign, StoreError> {
        let mut state = self.lock();
        let id = state.next_id();
        let campaign = Campaign {
            id,
            tenant_id,
            name: input.name.clone(),
            template_name: input.template_name.clone(),
            department_code: input.department_code.clone(),
            submitted_at: None,
            created_at: Utc::now(),
        };
        state.campaigns.insert(id, campaign.clone());
        Ok(campaign)
    }

    async fn find_campaign(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Option<Campaign>, StoreError> {
        Ok(self
            .lock()
            .campaigns
            .get(&campaign_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn mark_campaign_submitted(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound {
                entity: "Campaign",
                id: campaign_id,
            })?;
        campaign.submitted_at.get_or_insert(at);
        Ok(())
    }

    async fn insert_recipients(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
        phones: &[String],
    ) -> Result<Vec<Recipient>, StoreError> {
        let mut state = self.lock();
        let mut inserted = Vec::with_capacity(phones.len());
        for phone in phones {
            let exists = state
                .recipients
                .values()
                .any(|r| r.campaign_id == campaign_id && &r.phone == phone);
            if exists {
                continue;
            }
            let id = state.next_id();
            let now = Utc::now();
            let recipient = Recipient {
                id,
                tenant_id,
                campaign_id,
                phone: phone.clone(),
                provider_message_id: None,
                sent_at: None,
                delivered_at: None,
                read_at: None,
                replied_at: None,
                failed_at: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            };
            state.recipients.insert(id, recipient.clone());
            inserted.push(recipient);
        }
        Ok(inserted)
    }

    async fn list_recipients(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Vec<Recipient>, StoreError> {
        Ok(self
            .lock()
            .recipients
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn find_recipient(
        &self,
        tenant_id: TenantId,
        recipient_id: DbId,
    ) -> Result<Option<Recipient>, StoreError> {
        Ok(self
            .lock()
            .recipients
            .get(&recipient_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    async fn apply_event(
        &self,
        tenant_id: TenantId,
        target: &RecipientRef,
        event: &DeliveryEvent,
    ) -> Result<MergeOutcome, StoreError> {
        Ok(self.merge(tenant_id, target, event, None))
    }

    async fn record_sent(
        &self,
        tenant_id: TenantId,
        recipient_id: DbId,
        provider_message_id: &str,
        at: Timestamp,
    ) -> Result<MergeOutcome, StoreError> {
        Ok(self.merge(
            tenant_id,
            &RecipientRef::Id(recipient_id),
            &DeliveryEvent::new(DeliveryEventKind::Sent, at),
            Some(provider_message_id),
        ))
    }

    async fn find_conversation(
        &self,
        tenant_id: TenantId,
        conversation_id: DbId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .lock()
            .conversations
            .get(&conversation_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn insert_conversation_message(
        &self,
        tenant_id: TenantId,
        input: &NewConversationMessage,
    ) -> Result<ConversationMessage, StoreError> {
        let mut state = self.lock();
        let id = state.next_id();
        let message = ConversationMessage {
            id,
            tenant_id,
            conversation_id: input.conversation_id,
            body: input.body.clone(),
            media_url: input.media_url.clone(),
            media_type: input.media_type.clone(),
            provider_message_id: input.provider_message_id.clone(),
            created_at: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn find_channel_account(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<ChannelAccount>, StoreError> {
        Ok(self.lock().channel_accounts.get(&tenant_id).cloned())
    }

    async fn record_webhook_audit(&self, entry: &NewWebhookAudit) -> Result<(), StoreError> {
        let mut state = self.lock();
        let id = state.next_id();
        state.audits.push(WebhookAuditLog {
            id,
            tenant_id: entry.tenant_id,
            outcome: entry.outcome.name().to_string(),
            target: entry.target.clone(),
            reason: entry.reason.clone(),
            payload: entry.payload.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}
