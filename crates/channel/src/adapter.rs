//! The channel seam and the logical outbound request.

use async_trait::async_trait;
use relay_core::media::MediaKind;
use relay_core::types::{DbId, TenantId};
use serde::Serialize;

use crate::error::ChannelSendError;

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    Text {
        body: String,
    },
    Template {
        name: String,
    },
    Media {
        url: String,
        kind: MediaKind,
        caption: Option<String>,
        filename: Option<String>,
    },
}

/// One outbound message for one phone, always scoped to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundRequest {
    pub tenant_id: TenantId,
    pub phone: String,
    pub payload: MessagePayload,
    pub conversation_id: Option<DbId>,
    pub department_code: Option<String>,
}

impl OutboundRequest {
    pub fn new(tenant_id: TenantId, phone: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            tenant_id,
            phone: phone.into(),
            payload,
            conversation_id: None,
            department_code: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: DbId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_department(mut self, department_code: Option<String>) -> Self {
        self.department_code = department_code;
        self
    }
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub provider_message_id: String,
}

/// Outbound messaging channel.
///
/// Implementations provide [`send`](ChannelAdapter::send); the typed
/// helpers build the matching [`MessagePayload`].
#[async_trait]
pub trait ChannelAdapter: Send + Sync + 'static {
    async fn send(&self, request: &OutboundRequest) -> Result<SendReceipt, ChannelSendError>;

    async fn send_text(
        &self,
        tenant_id: TenantId,
        phone: &str,
        body: &str,
    ) -> Result<SendReceipt, ChannelSendError> {
        let payload = MessagePayload::Text {
            body: body.to_string(),
        };
        self.send(&OutboundRequest::new(tenant_id, phone, payload))
            .await
    }

    async fn send_template(
        &self,
        tenant_id: TenantId,
        phone: &str,
        template_name: &str,
    ) -> Result<SendReceipt, ChannelSendError> {
        let payload = MessagePayload::Template {
            name: template_name.to_string(),
        };
        self.send(&OutboundRequest::new(tenant_id, phone, payload))
            .await
    }

    async fn send_media(
        &self,
        tenant_id: TenantId,
        phone: &str,
        url: &str,
        kind: MediaKind,
        caption: Option<&str>,
        filename: Option<&str>,
    ) -> Result<SendReceipt, ChannelSendError> {
        let payload = MessagePayload::Media {
            url: url.to_string(),
            kind,
            caption: caption.map(str::to_string),
            filename: filename.map(str::to_string),
        };
        self.send(&OutboundRequest::new(tenant_id, phone, payload))
            .await
    }
}
