//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Guard state changes produce:
//!     → listeners.rs (snapshots to subscribed callbacks, e.g. a UI banner)
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - Listeners are notified after the guard's lock is released
//! - Metrics are cheap (atomic increments)

pub mod listeners;
pub mod logging;
pub mod metrics;

pub use listeners::{ListenerSet, Subscription};
