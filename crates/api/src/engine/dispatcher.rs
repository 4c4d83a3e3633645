//! Campaign dispatch.
//!
//! [`DispatchEngine::submit`] validates a campaign, writes one `queued`
//! recipient per phone, and spawns a scheduling task that feeds recipients
//! into a bounded pool of send tasks. A [`Semaphore`] caps in-flight sends
//! and a [`TokenBucket`] caps the start rate, independently of each other.
//! The returned [`DispatchHandle`] pauses, resumes and cancels the
//! not-yet-started part of the campaign; sends already in flight always run
//! to completion and their results are recorded.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use relay_channel::{ChannelAdapter, MessagePayload, OutboundRequest};
use relay_core::campaign::MAX_RECIPIENTS_PER_CAMPAIGN;
use relay_core::context::RequestContext;
use relay_core::delivery::{DeliveryEvent, CANCELLED_MESSAGE};
use relay_core::error::CoreError;
use relay_core::phone::normalize_phone;
use relay_core::rate_limit::TokenBucket;
use relay_core::retry::RetryPolicy;
use relay_core::roles::Role;
use relay_core::types::{DbId, TenantId};
use relay_core::webhook::RecipientRef;
use relay_db::models::campaign::{Campaign, NewCampaign};
use relay_db::models::recipient::Recipient;
use relay_db::{DeliveryStore, MergeOutcome, StoreError};
use relay_events::{RealtimeProjector, RecipientStateChange};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::registry::DispatchRegistry;
use super::send::send_with_retry;
use crate::config::DispatchConfig;
use crate::error::AppResult;

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// A campaign as submitted by an operator.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignSubmission {
    pub name: String,
    pub template_name: String,
    #[serde(default)]
    pub department_code: Option<String>,
    pub recipients: Vec<String>,
}

impl CampaignSubmission {
    /// Check the submission and normalise its phones.
    ///
    /// Returns the campaign row input and the distinct phones in submission
    /// order. Nothing is written until this succeeds.
    pub fn validate(&self) -> Result<(NewCampaign, Vec<String>), CoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::invalid("Campaign name must not be empty"));
        }
        let template_name = self.template_name.trim();
        if template_name.is_empty() {
            return Err(CoreError::invalid("Template name must not be empty"));
        }
        if self.recipients.is_empty() {
            return Err(CoreError::invalid("A campaign needs at least one recipient"));
        }
        if self.recipients.len() > MAX_RECIPIENTS_PER_CAMPAIGN {
            return Err(CoreError::invalid(format!(
                "A campaign accepts at most {MAX_RECIPIENTS_PER_CAMPAIGN} recipients, got {}",
                self.recipients.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.recipients.len());
        let mut phones = Vec::with_capacity(self.recipients.len());
        for raw in &self.recipients {
            let phone = normalize_phone(raw)?;
            if seen.insert(phone.clone()) {
                phones.push(phone);
            }
        }

        let department_code = self
            .department_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);

        Ok((
            NewCampaign {
                name: name.to_string(),
                template_name: template_name.to_string(),
                department_code,
            },
            phones,
        ))
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Control operations on a running dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    Pause,
    Resume,
    Cancel,
}

impl DispatchAction {
    /// Lowest role allowed to perform the action.
    pub fn min_role(self) -> Role {
        match self {
            Self::Pause | Self::Resume => Role::Operator,
            Self::Cancel => Role::Admin,
        }
    }
}

/// Point-in-time view of a dispatch, returned by the control endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchStatus {
    pub campaign_id: DbId,
    pub paused: bool,
    pub cancelled: bool,
    pub finished: bool,
}

struct DispatchControl {
    tenant_id: TenantId,
    campaign_id: DbId,
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    done: CancellationToken,
}

/// Cheaply cloneable handle to one campaign's dispatch.
#[derive(Clone)]
pub struct DispatchHandle {
    inner: Arc<DispatchControl>,
}

impl DispatchHandle {
    fn new(tenant_id: TenantId, campaign_id: DbId) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(DispatchControl {
                tenant_id,
                campaign_id,
                paused,
                cancel: CancellationToken::new(),
                done: CancellationToken::new(),
            }),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.inner.tenant_id
    }

    pub fn campaign_id(&self) -> DbId {
        self.inner.campaign_id
    }

    /// Stop starting new sends. In-flight sends complete normally.
    pub fn pause(&self) {
        if !self.inner.paused.send_replace(true) {
            tracing::info!(
                tenant_id = self.inner.tenant_id,
                campaign_id = self.inner.campaign_id,
                "Dispatch paused",
            );
        }
    }

    /// Undo [`pause`](Self::pause). Has no effect once cancelled.
    pub fn resume(&self) {
        if self.is_cancelled() {
            return;
        }
        if self.inner.paused.send_replace(false) {
            tracing::info!(
                tenant_id = self.inner.tenant_id,
                campaign_id = self.inner.campaign_id,
                "Dispatch resumed",
            );
        }
    }

    /// Pause, then mark every recipient that has not started as failed with
    /// reason `cancelled`.
    pub fn cancel(&self) {
        self.inner.paused.send_replace(true);
        if !self.inner.cancel.is_cancelled() {
            tracing::info!(
                tenant_id = self.inner.tenant_id,
                campaign_id = self.inner.campaign_id,
                "Dispatch cancelled",
            );
        }
        self.inner.cancel.cancel();
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// Resolves once every recipient has either been sent, failed, or
    /// been marked cancelled.
    pub async fn finished(&self) {
        self.inner.done.cancelled().await;
    }

    pub fn status(&self) -> DispatchStatus {
        DispatchStatus {
            campaign_id: self.inner.campaign_id,
            paused: self.is_paused(),
            cancelled: self.is_cancelled(),
            finished: self.is_finished(),
        }
    }

    /// Wait while paused. Returns `false` if the dispatch was cancelled.
    async fn wait_until_runnable(&self) -> bool {
        let mut paused = self.inner.paused.subscribe();
        loop {
            if self.inner.cancel.is_cancelled() {
                return false;
            }
            if !*paused.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = self.inner.cancel.cancelled() => return false,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct DispatchEngine {
    store: Arc<dyn DeliveryStore>,
    channel: Arc<dyn ChannelAdapter>,
    projector: Arc<RealtimeProjector>,
    registry: Arc<DispatchRegistry>,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        channel: Arc<dyn ChannelAdapter>,
        projector: Arc<RealtimeProjector>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            channel,
            projector,
            registry: Arc::new(DispatchRegistry::new()),
            config,
        }
    }

    pub fn registry(&self) -> &DispatchRegistry {
        &self.registry
    }

    /// Create the campaign and its recipients, then start sending.
    ///
    /// Returns once every recipient row exists in state `queued`; sends
    /// proceed in the background under the returned handle.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        submission: &CampaignSubmission,
    ) -> AppResult<(Campaign, DispatchHandle)> {
        ctx.require(Role::Operator)?;
        let (input, phones) = submission.validate()?;
        let tenant_id = ctx.tenant_id;

        let mut campaign = self.store.create_campaign(tenant_id, &input).await?;
        let recipients = self
            .store
            .insert_recipients(tenant_id, campaign.id, &phones)
            .await?;
        let submitted_at = Utc::now();
        self.store
            .mark_campaign_submitted(tenant_id, campaign.id, submitted_at)
            .await?;
        campaign.submitted_at = Some(submitted_at);

        for recipient in &recipients {
            self.projector
                .publish(&RecipientStateChange::insert(recipient.clone()));
        }

        let handle = DispatchHandle::new(tenant_id, campaign.id);
        self.registry.insert(handle.clone());

        tracing::info!(
            tenant_id,
            campaign_id = campaign.id,
            recipients = recipients.len(),
            template = %campaign.template_name,
            "Campaign submitted",
        );

        let run = CampaignRun {
            sender: RecipientSender {
                store: Arc::clone(&self.store),
                channel: Arc::clone(&self.channel),
                projector: Arc::clone(&self.projector),
                retry: self.config.retry,
                template_name: campaign.template_name.clone(),
                department_code: campaign.department_code.clone(),
            },
            registry: Arc::clone(&self.registry),
            handle: handle.clone(),
            concurrency: self.config.concurrency.max(1),
            rate_per_sec: self.config.rate_per_sec,
            burst: self.config.burst,
        };
        tokio::spawn(run.execute(recipients));

        Ok((campaign, handle))
    }

    /// Apply a control action to a campaign's running dispatch.
    ///
    /// Unknown or foreign campaigns are `NotFound`; a campaign whose
    /// dispatch already finished is a `Conflict`.
    pub async fn control(
        &self,
        ctx: &RequestContext,
        campaign_id: DbId,
        action: DispatchAction,
    ) -> AppResult<DispatchStatus> {
        ctx.require(action.min_role())?;

        self.store
            .find_campaign(ctx.tenant_id, campaign_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Campaign",
                id: campaign_id,
            })?;

        let handle = self
            .registry
            .get(ctx.tenant_id, campaign_id)
            .ok_or_else(|| {
                CoreError::Conflict(format!("Campaign {campaign_id} has no active dispatch"))
            })?;

        match action {
            DispatchAction::Pause => handle.pause(),
            DispatchAction::Resume => handle.resume(),
            DispatchAction::Cancel => handle.cancel(),
        }
        Ok(handle.status())
    }

    /// Pause every running dispatch; used on shutdown.
    pub fn pause_all(&self) -> usize {
        self.registry.pause_all()
    }
}

// ---------------------------------------------------------------------------
// Per-campaign run
// ---------------------------------------------------------------------------

/// Everything a single recipient send needs, cloned into each send task.
#[derive(Clone)]
struct RecipientSender {
    store: Arc<dyn DeliveryStore>,
    channel: Arc<dyn ChannelAdapter>,
    projector: Arc<RealtimeProjector>,
    retry: RetryPolicy,
    template_name: String,
    department_code: Option<String>,
}

impl RecipientSender {
    async fn deliver(&self, recipient: Recipient) {
        let request = OutboundRequest::new(
            recipient.tenant_id,
            recipient.phone.clone(),
            MessagePayload::Template {
                name: self.template_name.clone(),
            },
        )
        .with_department(self.department_code.clone());

        let outcome = match send_with_retry(self.channel.as_ref(), &request, &self.retry).await {
            Ok(receipt) => {
                self.store
                    .record_sent(
                        recipient.tenant_id,
                        recipient.id,
                        &receipt.provider_message_id,
                        Utc::now(),
                    )
                    .await
            }
            Err(err) => {
                tracing::warn!(
                    tenant_id = recipient.tenant_id,
                    campaign_id = recipient.campaign_id,
                    recipient_id = recipient.id,
                    transient = err.is_transient(),
                    error = %err,
                    "Recipient send failed",
                );
                let event = DeliveryEvent::failed(Utc::now(), err.recipient_annotation());
                self.store
                    .apply_event(recipient.tenant_id, &RecipientRef::Id(recipient.id), &event)
                    .await
            }
        };

        self.publish(&recipient, outcome);
    }

    async fn mark_cancelled(&self, recipient: &Recipient) {
        let event = DeliveryEvent::failed(Utc::now(), CANCELLED_MESSAGE);
        let outcome = self
            .store
            .apply_event(recipient.tenant_id, &RecipientRef::Id(recipient.id), &event)
            .await;
        self.publish(recipient, outcome);
    }

    fn publish(&self, recipient: &Recipient, outcome: Result<MergeOutcome, StoreError>) {
        match outcome {
            Ok(MergeOutcome::Applied(updated)) => {
                self.projector
                    .publish(&RecipientStateChange::update(updated));
            }
            Ok(MergeOutcome::Unchanged(_)) => {}
            Ok(other) => {
                tracing::error!(
                    tenant_id = recipient.tenant_id,
                    recipient_id = recipient.id,
                    outcome = ?other,
                    "Recipient disappeared during dispatch",
                );
            }
            Err(e) => {
                tracing::error!(
                    tenant_id = recipient.tenant_id,
                    recipient_id = recipient.id,
                    error = %e,
                    "Failed to record send outcome",
                );
            }
        }
    }
}

struct CampaignRun {
    sender: RecipientSender,
    registry: Arc<DispatchRegistry>,
    handle: DispatchHandle,
    concurrency: usize,
    rate_per_sec: f64,
    burst: u32,
}

impl CampaignRun {
    async fn execute(self, recipients: Vec<Recipient>) {
        let tenant_id = self.handle.tenant_id();
        let campaign_id = self.handle.campaign_id();
        let cancel = self.handle.inner.cancel.clone();

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut bucket = TokenBucket::new(self.burst, self.rate_per_sec, Instant::now());
        let mut pending: VecDeque<Recipient> = recipients.into();
        let mut in_flight = JoinSet::new();

        'schedule: while !pending.is_empty() {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break 'schedule,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break 'schedule,
                },
            };

            while let Err(wait) = bucket.try_take(Instant::now()) {
                tokio::select! {
                    _ = cancel.cancelled() => break 'schedule,
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            if !self.handle.wait_until_runnable().await {
                break 'schedule;
            }

            let Some(recipient) = pending.pop_front() else {
                break;
            };
            let sender = self.sender.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                sender.deliver(recipient).await;
            });
        }

        if !pending.is_empty() {
            tracing::info!(
                tenant_id,
                campaign_id,
                cancelled = pending.len(),
                "Marking unstarted recipients cancelled",
            );
            for recipient in &pending {
                self.sender.mark_cancelled(recipient).await;
            }
        }

        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                tracing::error!(tenant_id, campaign_id, error = %e, "Send task panicked");
            }
        }

        self.registry.remove(tenant_id, campaign_id);
        self.handle.inner.done.cancel();
        tracing::info!(tenant_id, campaign_id, "Campaign dispatch finished");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use relay_core::error::ValidationReason;

    use super::*;

    fn submission(recipients: &[&str]) -> CampaignSubmission {
        CampaignSubmission {
            name: "Preventa Torre Norte".into(),
            template_name: "launch_v2".into(),
            department_code: Some("  MTY ".into()),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn duplicate_phones_collapse_in_submission_order() {
        let (input, phones) = submission(&["+52 55 1234 5678", "5215550001", "525512345678"])
            .validate()
            .unwrap();
        assert_eq!(phones, vec!["525512345678", "5215550001"]);
        assert_eq!(input.department_code.as_deref(), Some("MTY"));
    }

    #[test]
    fn malformed_phone_rejects_the_whole_submission() {
        let err = submission(&["5215550001", "call me"]).validate().unwrap_err();
        assert_matches!(
            err,
            CoreError::Validation {
                reason: ValidationReason::MalformedPhone,
                ..
            }
        );
    }

    #[test]
    fn blank_template_is_invalid() {
        let mut s = submission(&["5215550001"]);
        s.template_name = "  ".into();
        assert_matches!(
            s.validate(),
            Err(CoreError::Validation {
                reason: ValidationReason::InvalidInput,
                ..
            })
        );
    }

    #[test]
    fn empty_and_oversized_recipient_lists_are_invalid() {
        assert!(submission(&[]).validate().is_err());

        let many: Vec<String> = (0..=MAX_RECIPIENTS_PER_CAMPAIGN)
            .map(|i| format!("52155{i:07}"))
            .collect();
        let s = CampaignSubmission {
            recipients: many,
            ..submission(&[])
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn cancel_requires_admin() {
        assert_eq!(DispatchAction::Cancel.min_role(), Role::Admin);
        assert_eq!(DispatchAction::Pause.min_role(), Role::Operator);
    }

    #[tokio::test]
    async fn cancelled_handle_does_not_resume() {
        let handle = DispatchHandle::new(1, 1);
        handle.cancel();
        handle.resume();
        assert!(handle.is_paused());
        assert!(!handle.wait_until_runnable().await);
    }

    #[tokio::test]
    async fn resume_releases_a_paused_waiter() {
        let handle = DispatchHandle::new(1, 1);
        handle.pause();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_until_runnable().await })
        };
        tokio::task::yield_now().await;
        handle.resume();
        assert!(waiter.await.unwrap());
    }
}
