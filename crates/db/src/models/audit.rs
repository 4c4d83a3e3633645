//! Audit trail for webhook events that were received but not applied.
//!
//! Rows are append-only; there is no `updated_at`.

use relay_core::types::{DbId, TenantId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Why a webhook event was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAuditOutcome {
    Malformed,
    UnknownRecipient,
    TenantMismatch,
}

impl WebhookAuditOutcome {
    pub fn name(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnknownRecipient => "unknown_recipient",
            Self::TenantMismatch => "tenant_mismatch",
        }
    }
}

/// A row from the `webhook_audit_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookAuditLog {
    pub id: DbId,
    pub tenant_id: Option<TenantId>,
    pub outcome: String,
    pub target: Option<String>,
    pub reason: String,
    pub payload: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for inserting an audit entry.
#[derive(Debug, Clone)]
pub struct NewWebhookAudit {
    pub tenant_id: Option<TenantId>,
    pub outcome: WebhookAuditOutcome,
    pub target: Option<String>,
    pub reason: String,
    pub payload: Option<serde_json::Value>,
}
