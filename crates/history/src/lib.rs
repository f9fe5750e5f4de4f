//! Per-user conversation history for chatbridge.
//!
//! Owns each user's ordered message sequence and keeps it within the
//! platform's token budget:
//!
//! - [`budget`]: the length heuristic and the trim passes
//! - [`policy`]: per-platform initial history and budget kind
//! - [`store`]: the [`UserStore`] capability and its in-memory map
//! - [`turn_lock`]: one in-flight turn per user

pub mod budget;
pub mod policy;
pub mod store;
pub mod turn_lock;

pub use budget::{estimate_history, estimate_tokens, Budget};
pub use policy::{HistoryPolicies, PlatformPolicy};
pub use store::{InMemoryUserStore, UserStore};
pub use turn_lock::{TurnGuard, TurnLockMap};
