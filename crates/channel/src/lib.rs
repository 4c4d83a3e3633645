//! Outbound messaging channel.
//!
//! [`ChannelAdapter`] is the seam the dispatch engine sends through.
//! [`WhatsAppCloudAdapter`] talks to the WhatsApp Business Cloud API with
//! per-tenant credentials and folds every provider failure into
//! [`ChannelSendError`]'s transient/permanent split.

pub mod adapter;
pub mod config;
pub mod credentials;
pub mod error;
pub mod whatsapp;

pub use adapter::{ChannelAdapter, MessagePayload, OutboundRequest, SendReceipt};
pub use config::ChannelConfig;
pub use credentials::{ChannelCredentials, CredentialsProvider, StaticCredentials, StoreCredentials};
pub use error::ChannelSendError;
pub use whatsapp::WhatsAppCloudAdapter;
