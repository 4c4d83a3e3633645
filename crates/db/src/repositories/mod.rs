//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` (or an open transaction) as the first argument.

pub mod campaign_repo;
pub mod channel_account_repo;
pub mod conversation_repo;
pub mod recipient_repo;
pub mod webhook_audit_repo;

pub use campaign_repo::CampaignRepo;
pub use channel_account_repo::ChannelAccountRepo;
pub use conversation_repo::ConversationRepo;
pub use recipient_repo::RecipientRepo;
pub use webhook_audit_repo::WebhookAuditRepo;
