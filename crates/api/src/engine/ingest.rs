//! Provider webhook reconciliation.
//!
//! Every event is merged into its recipient through
//! [`DeliveryStore::apply_event`], which serializes writers per recipient
//! and applies the monotonic merge. Events that cannot be applied are
//! logged on the `audit` target, written to the webhook audit trail and
//! dropped; they never stop the rest of a batch. An event naming a
//! provider message id nobody has recorded yet is deferred instead: the
//! send that produced it may still be committing, so the provider is asked
//! to redeliver.

use std::sync::Arc;

use relay_core::context::RequestContext;
use relay_core::delivery::DeliveryEvent;
use relay_core::types::TenantId;
use relay_core::webhook::{parse_webhook_body, RecipientRef, WebhookParseError};
use relay_db::models::audit::{NewWebhookAudit, WebhookAuditOutcome};
use relay_db::models::recipient::Recipient;
use relay_db::{DeliveryStore, MergeOutcome, StoreError};
use relay_events::{RealtimeProjector, RecipientStateChange};
use serde::Serialize;

/// What happened to one delivery event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The recipient changed; carries the updated row.
    Applied(Recipient),
    /// Already reflected (a duplicate, or an older same-kind timestamp).
    Ignored,
    /// The event's tenant does not own the addressed recipient.
    RejectedTenantMismatch,
    /// No recipient has this id.
    RejectedUnknownRecipient,
    /// No recipient has recorded this provider message id yet.
    Deferred,
}

/// Per-batch counts returned to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub applied: u32,
    pub ignored: u32,
    pub rejected: u32,
    /// Events addressed by a provider message id that is not recorded yet.
    pub deferred: u32,
    /// Events not processed because the store was unavailable.
    pub failed: u32,
}

pub struct WebhookIngestor {
    store: Arc<dyn DeliveryStore>,
    projector: Arc<RealtimeProjector>,
}

impl WebhookIngestor {
    pub fn new(store: Arc<dyn DeliveryStore>, projector: Arc<RealtimeProjector>) -> Self {
        Self { store, projector }
    }

    /// Merge one event into the recipient it addresses, scoped to
    /// `ctx.tenant_id`.
    pub async fn ingest(
        &self,
        ctx: &RequestContext,
        target: &RecipientRef,
        event: &DeliveryEvent,
    ) -> Result<IngestOutcome, StoreError> {
        let tenant_id = ctx.tenant_id;
        match self.store.apply_event(tenant_id, target, event).await? {
            MergeOutcome::Applied(recipient) => {
                tracing::debug!(
                    tenant_id,
                    recipient_id = recipient.id,
                    kind = event.kind.name(),
                    state = recipient.state().name(),
                    "Delivery event applied",
                );
                self.projector
                    .publish(&RecipientStateChange::update(recipient.clone()));
                Ok(IngestOutcome::Applied(recipient))
            }
            MergeOutcome::Unchanged(recipient) => {
                tracing::debug!(
                    tenant_id,
                    recipient_id = recipient.id,
                    kind = event.kind.name(),
                    "Delivery event already reflected",
                );
                Ok(IngestOutcome::Ignored)
            }
            MergeOutcome::TenantMismatch { stored_tenant } => {
                self.audit(
                    Some(tenant_id),
                    WebhookAuditOutcome::TenantMismatch,
                    Some(target),
                    format!("event tenant {tenant_id} does not own recipient of tenant {stored_tenant}"),
                    serde_json::to_value(event).ok(),
                )
                .await;
                Ok(IngestOutcome::RejectedTenantMismatch)
            }
            MergeOutcome::UnknownRecipient => {
                let (reason, outcome) = match target {
                    RecipientRef::ProviderMessage(_) => (
                        "provider message id not recorded yet",
                        IngestOutcome::Deferred,
                    ),
                    RecipientRef::Id(_) => (
                        "no recipient matches the event",
                        IngestOutcome::RejectedUnknownRecipient,
                    ),
                };
                self.audit(
                    Some(tenant_id),
                    WebhookAuditOutcome::UnknownRecipient,
                    Some(target),
                    reason.to_string(),
                    serde_json::to_value(event).ok(),
                )
                .await;
                Ok(outcome)
            }
        }
    }

    /// Parse a raw webhook body and ingest each event independently.
    ///
    /// Fails only when the body as a whole is unreadable; malformed
    /// elements inside a batch are audited and counted as rejected.
    pub async fn ingest_body(&self, body: &[u8]) -> Result<IngestReport, WebhookParseError> {
        let events = match parse_webhook_body(body) {
            Ok(events) => events,
            Err(e) => {
                self.audit(None, WebhookAuditOutcome::Malformed, None, e.to_string(), None)
                    .await;
                return Err(e);
            }
        };

        let mut report = IngestReport::default();
        for parsed in events {
            let webhook = match parsed {
                Ok(webhook) => webhook,
                Err(e) => {
                    self.audit(None, WebhookAuditOutcome::Malformed, None, e.to_string(), None)
                        .await;
                    report.rejected += 1;
                    continue;
                }
            };

            let ctx = RequestContext::service(webhook.tenant_id);
            match self.ingest(&ctx, &webhook.target, &webhook.event).await {
                Ok(IngestOutcome::Applied(_)) => report.applied += 1,
                Ok(IngestOutcome::Ignored) => report.ignored += 1,
                Ok(IngestOutcome::RejectedTenantMismatch)
                | Ok(IngestOutcome::RejectedUnknownRecipient) => report.rejected += 1,
                Ok(IngestOutcome::Deferred) => report.deferred += 1,
                Err(e) => {
                    tracing::error!(
                        tenant_id = webhook.tenant_id,
                        recipient = %webhook.target,
                        error = %e,
                        "Failed to apply delivery event",
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            applied = report.applied,
            ignored = report.ignored,
            rejected = report.rejected,
            deferred = report.deferred,
            failed = report.failed,
            "Webhook batch processed",
        );
        Ok(report)
    }

    async fn audit(
        &self,
        tenant_id: Option<TenantId>,
        outcome: WebhookAuditOutcome,
        target: Option<&RecipientRef>,
        reason: String,
        payload: Option<serde_json::Value>,
    ) {
        let target = target.map(ToString::to_string);
        tracing::warn!(
            target: "audit",
            tenant_id = ?tenant_id,
            outcome = outcome.name(),
            recipient = ?target,
            reason = %reason,
            "Webhook event discarded",
        );

        let entry = NewWebhookAudit {
            tenant_id,
            outcome,
            target,
            reason,
            payload,
        };
        if let Err(e) = self.store.record_webhook_audit(&entry).await {
            tracing::error!(error = %e, "Failed to write webhook audit entry");
        }
    }
}
