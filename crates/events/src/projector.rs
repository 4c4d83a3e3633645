//! Per-campaign fan-out of [`RecipientStateChange`]s.
//!
//! Each subscriber owns a bounded queue. Publishing uses `try_send`, so a
//! subscriber whose queue is full or whose receiver is gone is removed on
//! the spot instead of slowing the publisher. The registry lock is a plain
//! `std::sync::Mutex` held only while iterating senders; it is never held
//! across an `.await`.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};

use relay_core::types::{DbId, TenantId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::change::RecipientStateChange;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

type CampaignKey = (TenantId, DbId);

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<RecipientStateChange>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    campaigns: HashMap<CampaignKey, Vec<Subscriber>>,
}

pub struct RealtimeProjector {
    registry: Mutex<Registry>,
    capacity: usize,
}

impl RealtimeProjector {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start receiving changes for one campaign of one tenant.
    ///
    /// Only changes published after this call are delivered. Calling again
    /// after the stream ended starts a fresh subscription.
    pub fn subscribe(&self, tenant_id: TenantId, campaign_id: DbId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .campaigns
            .entry((tenant_id, campaign_id))
            .or_default()
            .push(Subscriber { id, sender });

        tracing::debug!(tenant_id, campaign_id, subscriber_id = id, "Realtime subscriber added");
        Subscription {
            id,
            tenant_id,
            campaign_id,
            inner: ReceiverStream::new(receiver),
        }
    }

    /// Deliver a change to every subscriber of its campaign without waiting.
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, change: &RecipientStateChange) -> usize {
        let key = (change.tenant_id(), change.campaign_id());
        let mut registry = self.lock();
        let Some(subscribers) = registry.campaigns.get_mut(&key) else {
            return 0;
        };

        subscribers.retain(|subscriber| match subscriber.sender.try_send(change.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    tenant_id = key.0,
                    campaign_id = key.1,
                    subscriber_id = subscriber.id,
                    "Dropping slow realtime subscriber",
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });

        let delivered = subscribers.len();
        if subscribers.is_empty() {
            registry.campaigns.remove(&key);
        }
        delivered
    }

    /// End every stream for a campaign. Subscribers drain what is already
    /// queued and then see the stream finish.
    pub fn close_campaign(&self, tenant_id: TenantId, campaign_id: DbId) -> usize {
        let removed = self
            .lock()
            .campaigns
            .remove(&(tenant_id, campaign_id))
            .map(|subscribers| subscribers.len())
            .unwrap_or(0);
        if removed > 0 {
            tracing::info!(tenant_id, campaign_id, removed, "Closed realtime campaign streams");
        }
        removed
    }

    /// Campaigns that still have at least one live subscriber.
    ///
    /// Prunes subscribers whose receiving side has gone away.
    pub fn active_campaigns(&self) -> Vec<(TenantId, DbId)> {
        let mut registry = self.lock();
        registry.campaigns.retain(|_, subscribers| {
            subscribers.retain(|s| !s.sender.is_closed());
            !subscribers.is_empty()
        });
        registry.campaigns.keys().copied().collect()
    }

    /// Live subscriber count for one campaign.
    pub fn subscriber_count(&self, tenant_id: TenantId, campaign_id: DbId) -> usize {
        self.lock()
            .campaigns
            .get(&(tenant_id, campaign_id))
            .map(|subscribers| subscribers.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every subscriber, ending all streams.
    pub fn close_all(&self) {
        self.lock().campaigns.clear();
    }
}

impl Default for RealtimeProjector {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A lazy stream of changes for one campaign.
///
/// Dropping it unsubscribes; the registry entry is pruned on the next
/// publish or sweep.
pub struct Subscription {
    id: u64,
    tenant_id: TenantId,
    campaign_id: DbId,
    inner: ReceiverStream<RecipientStateChange>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn campaign_id(&self) -> DbId {
        self.campaign_id
    }

    /// Next change, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<RecipientStateChange> {
        self.inner.as_mut().recv().await
    }
}

impl Stream for Subscription {
    type Item = RecipientStateChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
