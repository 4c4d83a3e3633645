//! Campaign status derivation and the summary aggregator.
//!
//! Both are pure recounts over recipient timelines. Nothing here keeps
//! running counters, so the numbers always agree with the individual
//! recipient records, including after a restart.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::delivery::{DeliveryState, DeliveryTimeline};
use crate::types::Timestamp;

/// Maximum number of recipients accepted in a single submission.
pub const MAX_RECIPIENTS_PER_CAMPAIGN: usize = 10_000;

/// Default delivery timeout after which a sent-only recipient stops
/// holding its campaign in `sending`.
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: i64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Sent,
}

impl CampaignStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sending => "sending",
            Self::Sent => "sent",
        }
    }
}

/// Whether a recipient no longer holds its campaign open.
///
/// Delivered, read, replied and failed are terminal outright. A recipient
/// that only reached `sent` becomes terminal once `delivery_timeout` has
/// elapsed since `sent_at`.
pub fn is_terminal(timeline: &DeliveryTimeline, now: Timestamp, delivery_timeout: Duration) -> bool {
    match timeline.state() {
        DeliveryState::Queued => false,
        DeliveryState::Sent => timeline
            .sent_at
            .is_some_and(|sent_at| now - sent_at >= delivery_timeout),
        DeliveryState::Failed
        | DeliveryState::Delivered
        | DeliveryState::Read
        | DeliveryState::Replied => true,
    }
}

/// Derive a campaign's status from its submission flag and recipients.
pub fn derive_status<'a>(
    submitted: bool,
    timelines: impl IntoIterator<Item = &'a DeliveryTimeline>,
    now: Timestamp,
    delivery_timeout: Duration,
) -> CampaignStatus {
    if !submitted {
        return CampaignStatus::Draft;
    }
    let all_terminal = timelines
        .into_iter()
        .all(|t| is_terminal(t, now, delivery_timeout));
    if all_terminal {
        CampaignStatus::Sent
    } else {
        CampaignStatus::Sending
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Per-state recipient counts for one campaign.
///
/// Every recipient is counted exactly once under its derived state, so the
/// counts always sum to `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub total: u64,
    pub queued: u64,
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub replied: u64,
    pub failed: u64,
}

impl CampaignSummary {
    fn count(&mut self, state: DeliveryState) {
        self.total += 1;
        match state {
            DeliveryState::Queued => self.queued += 1,
            DeliveryState::Sent => self.sent += 1,
            DeliveryState::Failed => self.failed += 1,
            DeliveryState::Delivered => self.delivered += 1,
            DeliveryState::Read => self.read += 1,
            DeliveryState::Replied => self.replied += 1,
        }
    }

    /// Sum of the per-state buckets.
    pub fn bucket_sum(&self) -> u64 {
        self.queued + self.sent + self.delivered + self.read + self.replied + self.failed
    }
}

/// Recount a campaign's recipients by derived state.
pub fn summarize<'a>(timelines: impl IntoIterator<Item = &'a DeliveryTimeline>) -> CampaignSummary {
    let mut summary = CampaignSummary::default();
    for timeline in timelines {
        summary.count(timeline.state());
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
