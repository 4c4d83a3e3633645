//! Live projection of recipient state changes to campaign observers.
//!
//! - [`RealtimeProjector`]: per-campaign fan-out that never blocks the
//!   publisher.
//! - [`RecipientStateChange`]: the `{event, recipient}` envelope sent to
//!   subscribers.

pub mod change;
pub mod projector;

pub use change::{ChangeKind, RecipientStateChange};
pub use projector::{RealtimeProjector, Subscription};
