//! Campaign recipient entity and its delivery timeline.

use relay_core::delivery::{DeliveryState, DeliveryTimeline};
use relay_core::types::{DbId, TenantId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `campaign_recipients` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Recipient {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub campaign_id: DbId,
    pub phone: String,
    pub provider_message_id: Option<String>,
    pub sent_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
    pub replied_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Recipient {
    pub fn timeline(&self) -> DeliveryTimeline {
        DeliveryTimeline {
            sent_at: self.sent_at,
            delivered_at: self.delivered_at,
            read_at: self.read_at,
            replied_at: self.replied_at,
            failed_at: self.failed_at,
            error_message: self.error_message.clone(),
        }
    }

    pub fn set_timeline(&mut self, timeline: DeliveryTimeline) {
        self.sent_at = timeline.sent_at;
        self.delivered_at = timeline.delivered_at;
        self.read_at = timeline.read_at;
        self.replied_at = timeline.replied_at;
        self.failed_at = timeline.failed_at;
        self.error_message = timeline.error_message;
    }

    pub fn state(&self) -> DeliveryState {
        self.timeline().state()
    }
}

/// A recipient together with its derived state, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientView {
    #[serde(flatten)]
    pub recipient: Recipient,
    pub state: DeliveryState,
}

impl From<Recipient> for RecipientView {
    fn from(recipient: Recipient) -> Self {
        let state = recipient.state();
        Self { recipient, state }
    }
}
