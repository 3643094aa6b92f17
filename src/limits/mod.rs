//! Request volume tracking.
//!
//! # Data Flow
//! ```text
//! Admission attempt:
//!     → window.rs (expire old window, count attempt if below block threshold)
//!     → threshold.rs (Normal / NearLimit / AtLimit)
//!     → resilience::pause acts on AtLimit
//! ```
//!
//! # Design Decisions
//! - Fixed window that resets wholesale, not a decaying one
//! - Thresholds are absolute counts, blocking well below the server ceiling
//! - Refused attempts do not count against the window

pub mod threshold;
pub mod window;

pub use threshold::{ThresholdLevel, Thresholds};
pub use window::{WindowState, WindowTracker};
