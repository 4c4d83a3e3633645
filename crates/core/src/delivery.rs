//! Per-recipient delivery lifecycle and the monotonic merge rule.
//!
//! Provider callbacks arrive duplicated and out of order. Each progress
//! kind owns one timestamp field that only ever moves from unset to set
//! (or to an earlier instant of the same kind). The displayed state is a
//! projection over the populated fields, so it cannot regress no matter
//! which order the callbacks arrive in.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Default annotation when a failure callback carries no message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "delivery failed";

/// Annotation recorded for recipients cancelled before their send started.
pub const CANCELLED_MESSAGE: &str = "cancelled";

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventKind {
    Sent,
    Delivered,
    Read,
    Replied,
    Failed,
}

impl DeliveryEventKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "replied" => Some(Self::Replied),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Replied => "replied",
            Self::Failed => "failed",
        }
    }
}

/// A single lifecycle notification, already resolved to its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub kind: DeliveryEventKind,
    pub occurred_at: Timestamp,
    pub error_message: Option<String>,
}

impl DeliveryEvent {
    pub fn new(kind: DeliveryEventKind, occurred_at: Timestamp) -> Self {
        Self {
            kind,
            occurred_at,
            error_message: None,
        }
    }

    pub fn failed(occurred_at: Timestamp, message: impl Into<String>) -> Self {
        Self {
            kind: DeliveryEventKind::Failed,
            occurred_at,
            error_message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived state
// ---------------------------------------------------------------------------

/// Displayed recipient state, ordered by rank.
///
/// `Failed` ranks above `Sent` and below `Delivered`: a failure shows only
/// while nothing beyond `sent` is known, and later progress lifts the
/// state past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Queued,
    Sent,
    Failed,
    Delivered,
    Read,
    Replied,
}

impl DeliveryState {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Replied => "replied",
        }
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// The mergeable portion of a recipient record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTimeline {
    pub sent_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
    pub replied_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl DeliveryTimeline {
    /// Merge one event into the timeline. Returns `true` if anything changed.
    ///
    /// Commutative, associative and idempotent: any permutation of any
    /// multiset of events converges to the same timeline.
    pub fn apply(&mut self, event: &DeliveryEvent) -> bool {
        let before = self.clone();
        let at = event.occurred_at;

        match event.kind {
            DeliveryEventKind::Sent => self.sent_at = earliest(self.sent_at, at),
            DeliveryEventKind::Delivered => self.delivered_at = earliest(self.delivered_at, at),
            DeliveryEventKind::Read => self.read_at = earliest(self.read_at, at),
            DeliveryEventKind::Replied => self.replied_at = earliest(self.replied_at, at),
            DeliveryEventKind::Failed => {
                let message = event
                    .error_message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(DEFAULT_FAILURE_MESSAGE);
                self.record_failure(at, message);
            }
        }

        self.clamp_chain();
        *self != before
    }

    /// Non-mutating variant of [`apply`](Self::apply).
    pub fn merged(&self, event: &DeliveryEvent) -> Self {
        let mut next = self.clone();
        next.apply(event);
        next
    }

    /// Highest-ranked populated field.
    pub fn state(&self) -> DeliveryState {
        if self.replied_at.is_some() {
            DeliveryState::Replied
        } else if self.read_at.is_some() {
            DeliveryState::Read
        } else if self.delivered_at.is_some() {
            DeliveryState::Delivered
        } else if self.failed_at.is_some() {
            DeliveryState::Failed
        } else if self.sent_at.is_some() {
            DeliveryState::Sent
        } else {
            DeliveryState::Queued
        }
    }

    /// `true` once the recipient has progressed past `sent`.
    pub fn has_progress_beyond_sent(&self) -> bool {
        self.delivered_at.is_some() || self.read_at.is_some() || self.replied_at.is_some()
    }

    /// Keep the earliest failure; equal instants keep the smaller message.
    fn record_failure(&mut self, at: Timestamp, message: &str) {
        let replace = match (self.failed_at, self.error_message.as_deref()) {
            (None, _) => true,
            (Some(existing), _) if at < existing => true,
            (Some(existing), Some(current)) if at == existing => message < current,
            (Some(existing), None) => at <= existing,
            _ => false,
        };
        if replace {
            self.failed_at = Some(at);
            self.error_message = Some(message.to_string());
        }
    }

    /// Enforce `sent_at <= delivered_at <= read_at` over populated fields.
    ///
    /// Each field becomes the minimum of itself and its populated
    /// successors, which is still a pure function of the received events.
    fn clamp_chain(&mut self) {
        if let (Some(delivered), Some(read)) = (self.delivered_at, self.read_at) {
            self.delivered_at = Some(delivered.min(read));
        }
        let bound = self.delivered_at.or(self.read_at);
        if let (Some(sent), Some(bound)) = (self.sent_at, bound) {
            self.sent_at = Some(sent.min(bound));
        }
    }
}

fn earliest(current: Option<Timestamp>, candidate: Timestamp) -> Option<Timestamp> {
    Some(match current {
        Some(existing) => existing.min(candidate),
        None => candidate,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ev(kind: DeliveryEventKind, secs: i64) -> DeliveryEvent {
        DeliveryEvent::new(kind, at(secs))
    }

    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    fn fold(events: &[DeliveryEvent]) -> DeliveryTimeline {
        let mut timeline = DeliveryTimeline::default();
        for event in events {
            timeline.apply(event);
        }
        timeline
    }

    #[test]
    fn empty_timeline_is_queued() {
        assert_eq!(DeliveryTimeline::default().state(), DeliveryState::Queued);
    }

    #[test]
    fn read_before_delivered_records_both() {
        let mut t = DeliveryTimeline::default();
        t.apply(&ev(DeliveryEventKind::Sent, 0));
        t.apply(&ev(DeliveryEventKind::Read, 20));
        assert_eq!(t.state(), DeliveryState::Read);
        assert!(t.delivered_at.is_none());

        t.apply(&ev(DeliveryEventKind::Delivered, 10));
        assert_eq!(t.state(), DeliveryState::Read);
        assert_eq!(t.delivered_at, Some(at(10)));
        assert_eq!(t.read_at, Some(at(20)));
    }

    #[test]
    fn duplicate_event_is_a_no_op() {
        let mut t = DeliveryTimeline::default();
        let delivered = ev(DeliveryEventKind::Delivered, 5);
        assert!(t.apply(&delivered));
        let snapshot = t.clone();
        assert!(!t.apply(&delivered));
        assert_eq!(t, snapshot);
    }

    #[test]
    fn populated_field_is_not_overwritten_by_later_instant() {
        let mut t = DeliveryTimeline::default();
        t.apply(&ev(DeliveryEventKind::Delivered, 5));
        assert!(!t.apply(&ev(DeliveryEventKind::Delivered, 50)));
        assert_eq!(t.delivered_at, Some(at(5)));
    }

    #[test]
    fn failure_after_delivery_is_annotation_only() {
        let mut t = DeliveryTimeline::default();
        t.apply(&ev(DeliveryEventKind::Sent, 0));
        t.apply(&ev(DeliveryEventKind::Delivered, 3));
        t.apply(&DeliveryEvent::failed(at(4), "131026: undeliverable"));
        assert_eq!(t.state(), DeliveryState::Delivered);
        assert_eq!(t.error_message.as_deref(), Some("131026: undeliverable"));
    }

    #[test]
    fn failure_with_only_sent_is_terminal_failed() {
        let mut t = DeliveryTimeline::default();
        t.apply(&ev(DeliveryEventKind::Sent, 0));
        t.apply(&DeliveryEvent::failed(at(4), "boom"));
        assert_eq!(t.state(), DeliveryState::Failed);
    }

    #[test]
    fn failure_without_message_gets_default_annotation() {
        let mut t = DeliveryTimeline::default();
        t.apply(&DeliveryEvent::new(DeliveryEventKind::Failed, at(1)));
        assert_eq!(t.error_message.as_deref(), Some(DEFAULT_FAILURE_MESSAGE));
    }

    #[test]
    fn replied_is_independent_of_chain() {
        let mut t = DeliveryTimeline::default();
        t.apply(&ev(DeliveryEventKind::Replied, 1));
        assert_eq!(t.state(), DeliveryState::Replied);
        assert!(t.sent_at.is_none());
    }

    #[test]
    fn chain_is_clamped_when_clocks_disagree() {
        let mut t = DeliveryTimeline::default();
        t.apply(&ev(DeliveryEventKind::Read, 10));
        t.apply(&ev(DeliveryEventKind::Delivered, 30));
        t.apply(&ev(DeliveryEventKind::Sent, 40));
        assert_eq!(t.read_at, Some(at(10)));
        assert_eq!(t.delivered_at, Some(at(10)));
        assert_eq!(t.sent_at, Some(at(10)));
    }

    #[test]
    fn every_arrival_order_converges() {
        let events = vec![
            ev(DeliveryEventKind::Sent, 0),
            ev(DeliveryEventKind::Delivered, 10),
            ev(DeliveryEventKind::Read, 20),
            ev(DeliveryEventKind::Delivered, 12),
            DeliveryEvent::failed(at(11), "late failure"),
            ev(DeliveryEventKind::Read, 25),
        ];

        let mut sorted = events.clone();
        sorted.sort_by_key(|e| e.occurred_at);
        let expected = fold(&sorted);

        for order in permutations(&events) {
            assert_eq!(fold(&order), expected);
        }
    }

    #[test]
    fn duplicated_stream_matches_deduplicated_stream() {
        let base = vec![
            ev(DeliveryEventKind::Sent, 0),
            ev(DeliveryEventKind::Read, 9),
            ev(DeliveryEventKind::Delivered, 4),
        ];
        let mut noisy = base.clone();
        noisy.extend(base.iter().rev().cloned());
        noisy.push(base[1].clone());

        assert_eq!(fold(&noisy), fold(&base));
    }

    #[test]
    fn state_rank_never_decreases() {
        let events = vec![
            ev(DeliveryEventKind::Sent, 0),
            DeliveryEvent::failed(at(2), "x"),
            ev(DeliveryEventKind::Delivered, 3),
            ev(DeliveryEventKind::Read, 5),
            ev(DeliveryEventKind::Replied, 7),
        ];
        for order in permutations(&events) {
            let mut t = DeliveryTimeline::default();
            let mut last = t.state().rank();
            for event in &order {
                t.apply(event);
                let rank = t.state().rank();
                assert!(rank >= last, "rank regressed in {order:?}");
                last = rank;
            }
        }
    }

    #[test]
    fn earliest_failure_wins_regardless_of_order() {
        let a = DeliveryEvent::failed(at(5), "second");
        let b = DeliveryEvent::failed(at(5), "first");
        let c = DeliveryEvent::failed(at(5) + Duration::seconds(1), "later");
        for order in permutations(&[a.clone(), b.clone(), c.clone()]) {
            let t = fold(&order);
            assert_eq!(t.error_message.as_deref(), Some("first"));
            assert_eq!(t.failed_at, Some(at(5)));
        }
    }

    #[test]
    fn kind_names_parse_case_insensitively() {
        assert_eq!(
            DeliveryEventKind::from_name("DELIVERED"),
            Some(DeliveryEventKind::Delivered)
        );
        assert_eq!(DeliveryEventKind::from_name("bounced"), None);
        for kind in [
            DeliveryEventKind::Sent,
            DeliveryEventKind::Delivered,
            DeliveryEventKind::Read,
            DeliveryEventKind::Replied,
            DeliveryEventKind::Failed,
        ] {
            assert_eq!(DeliveryEventKind::from_name(kind.name()), Some(kind));
        }
    }
}
