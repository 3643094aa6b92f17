//! HTTP integration.
//!
//! # Data Flow
//! ```text
//! GuardedClient::send(request)
//!     → guard.admit()            (Blocked → error, or queue in queue mode)
//!     → permit.run(send)         (Cancelled if the guard pauses/opens mid-flight)
//!     → Retry-After parsed       (retry_after.rs)
//!     → guard.on_response(...)   (429 → ServerOverload)
//! ```
//!
//! # Design Decisions
//! - Non-429 error statuses are not the guard's concern and pass through
//! - The permit is held for the whole exchange so cancellation reaches it

pub mod client;
pub mod retry_after;

pub use client::GuardedClient;
pub use retry_after::parse_retry_after;
