//! WebSocket infrastructure for live campaign progress.
//!
//! Provides connection management, heartbeat pings, and the HTTP upgrade
//! handler that bridges a realtime subscription onto a socket.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::campaign_ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{CampaignWatch, WsManager};
