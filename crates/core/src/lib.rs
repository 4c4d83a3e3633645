//! Pure domain logic for message dispatch and delivery tracking.
//!
//! No I/O lives here: persistence, the channel provider, object storage
//! and HTTP are all in sibling crates that depend on this one.

pub mod campaign;
pub mod context;
pub mod delivery;
pub mod error;
pub mod media;
pub mod phone;
pub mod rate_limit;
pub mod retry;
pub mod roles;
pub mod types;
pub mod webhook;
