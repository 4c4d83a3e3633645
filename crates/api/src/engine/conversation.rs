//! One-off sends into an existing conversation.
//!
//! Media is staged first and sent by its public URL. A message row is
//! recorded only after the channel accepted the send, so a failed upload or
//! a rejected send leaves the conversation untouched.

use std::sync::Arc;

use relay_channel::{ChannelAdapter, MessagePayload, OutboundRequest};
use relay_core::context::RequestContext;
use relay_core::error::CoreError;
use relay_core::retry::RetryPolicy;
use relay_core::roles::Role;
use relay_core::types::{DbId, TenantId};
use relay_db::models::conversation::{Conversation, ConversationMessage, NewConversationMessage};
use relay_db::DeliveryStore;
use relay_storage::{MediaAsset, MediaStagingService, MediaUpload};
use serde::Serialize;

use super::send::send_with_retry;
use crate::error::AppResult;

/// Result of a media send: the recorded message and the stored asset.
#[derive(Debug, Clone, Serialize)]
pub struct SentMedia {
    pub message: ConversationMessage,
    pub asset: MediaAsset,
}

pub struct ConversationSender {
    store: Arc<dyn DeliveryStore>,
    channel: Arc<dyn ChannelAdapter>,
    staging: Arc<MediaStagingService>,
    retry: RetryPolicy,
}

impl ConversationSender {
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        channel: Arc<dyn ChannelAdapter>,
        staging: Arc<MediaStagingService>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            channel,
            staging,
            retry,
        }
    }

    pub async fn send_text(
        &self,
        ctx: &RequestContext,
        conversation_id: DbId,
        body: &str,
    ) -> AppResult<ConversationMessage> {
        ctx.require(Role::Operator)?;
        let body = body.trim();
        if body.is_empty() {
            return Err(CoreError::invalid("Message body must not be empty").into());
        }
        let conversation = self.load(ctx.tenant_id, conversation_id).await?;

        let request = OutboundRequest::new(
            ctx.tenant_id,
            conversation.phone.clone(),
            MessagePayload::Text {
                body: body.to_string(),
            },
        )
        .with_conversation(conversation_id);
        let receipt = send_with_retry(self.channel.as_ref(), &request, &self.retry).await?;

        let message = self
            .store
            .insert_conversation_message(
                ctx.tenant_id,
                &NewConversationMessage {
                    conversation_id,
                    body: Some(body.to_string()),
                    media_url: None,
                    media_type: None,
                    provider_message_id: receipt.provider_message_id,
                },
            )
            .await?;

        tracing::info!(
            tenant_id = ctx.tenant_id,
            conversation_id,
            message_id = message.id,
            "Text message sent",
        );
        Ok(message)
    }

    /// Stage `upload`, send it by URL, and record the message.
    ///
    /// Validation failures happen before anything is written or sent.
    pub async fn send_media(
        &self,
        ctx: &RequestContext,
        conversation_id: DbId,
        upload: MediaUpload,
        caption: Option<String>,
    ) -> AppResult<SentMedia> {
        ctx.require(Role::Operator)?;
        let conversation = self.load(ctx.tenant_id, conversation_id).await?;
        let filename = upload.filename.clone();
        let caption = caption
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let asset = self
            .staging
            .stage(ctx.tenant_id, conversation_id, upload)
            .await?;

        let request = OutboundRequest::new(
            ctx.tenant_id,
            conversation.phone.clone(),
            MessagePayload::Media {
                url: asset.public_url.clone(),
                kind: asset.kind,
                caption: caption.clone(),
                filename: Some(filename),
            },
        )
        .with_conversation(conversation_id);
        let receipt = send_with_retry(self.channel.as_ref(), &request, &self.retry).await?;

        let message = self
            .store
            .insert_conversation_message(
                ctx.tenant_id,
                &NewConversationMessage {
                    conversation_id,
                    body: caption,
                    media_url: Some(asset.public_url.clone()),
                    media_type: Some(asset.content_type.clone()),
                    provider_message_id: receipt.provider_message_id,
                },
            )
            .await?;

        tracing::info!(
            tenant_id = ctx.tenant_id,
            conversation_id,
            message_id = message.id,
            kind = asset.kind.name(),
            size_bytes = asset.size_bytes,
            "Media message sent",
        );
        Ok(SentMedia { message, asset })
    }

    async fn load(&self, tenant_id: TenantId, conversation_id: DbId) -> AppResult<Conversation> {
        let conversation = self
            .store
            .find_conversation(tenant_id, conversation_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Conversation",
                id: conversation_id,
            })?;
        Ok(conversation)
    }
}
