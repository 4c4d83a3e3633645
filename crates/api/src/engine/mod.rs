//! The messaging engine behind the HTTP surface.
//!
//! - [`dispatcher`] -- campaign submission and the rate-limited send pool.
//! - [`registry`] -- live [`DispatchHandle`](dispatcher::DispatchHandle)s by campaign.
//! - [`ingest`] -- provider webhook reconciliation.
//! - [`aggregator`] -- campaign status and summary recounts.
//! - [`conversation`] -- one-off text and media sends into a conversation.
//! - [`send`] -- the retry loop shared by every outbound send.

pub mod aggregator;
pub mod conversation;
pub mod dispatcher;
pub mod ingest;
pub mod registry;
pub mod send;

pub use aggregator::{CampaignAggregator, CampaignDetail};
pub use conversation::{ConversationSender, SentMedia};
pub use dispatcher::{
    CampaignSubmission, DispatchAction, DispatchEngine, DispatchHandle, DispatchStatus,
};
pub use ingest::{IngestOutcome, IngestReport, WebhookIngestor};
pub use registry::DispatchRegistry;
