//! Deferred request replay.
//!
//! # Data Flow
//! ```text
//! Blocked caller (admission mode = queue):
//!     → sequencer.rs enqueue (FIFO)
//!     → drain loop: admit → run task → inter-request delay → next
//!     → guard blocks again: drain stops, tasks stay queued
//!     → guard notifies "clear": drain restarts
//! ```
//!
//! # Design Decisions
//! - Strictly one task at a time so a resume cannot burst back to the limit
//! - Queued tasks go through normal admission, so they count against the window
//! - Restart is driven by guard notifications, not polling

pub mod sequencer;

pub use sequencer::RequestQueue;
