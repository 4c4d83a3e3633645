//! The envelope delivered to realtime subscribers.

use relay_core::types::{DbId, TenantId};
use relay_db::models::recipient::{Recipient, RecipientView};
use serde::Serialize;

/// Whether the recipient row was just created or changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// One recipient transition, serialized as `{"event": ..., "recipient": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientStateChange {
    pub event: ChangeKind,
    pub recipient: RecipientView,
}

impl RecipientStateChange {
    pub fn insert(recipient: Recipient) -> Self {
        Self {
            event: ChangeKind::Insert,
            recipient: recipient.into(),
        }
    }

    pub fn update(recipient: Recipient) -> Self {
        Self {
            event: ChangeKind::Update,
            recipient: recipient.into(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.recipient.recipient.tenant_id
    }

    pub fn campaign_id(&self) -> DbId {
        self.recipient.recipient.campaign_id
    }
}
