//! Client-side rate-limit guard.
//!
//! Keeps an API client under a server's request ceiling: counts requests in a
//! fixed window, pauses before the ceiling is reached, opens a circuit when the
//! server answers 429, and cancels in-flight requests whenever it starts
//! blocking.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ http::GuardedClient ──▶ guard::Guard::admit ──▶ reqwest
//!                    │                      │
//!                    │ (queue mode)         ├── limits     (window, thresholds)
//!                    ▼                      ├── resilience (circuit, pause, backoff)
//!              queue::RequestQueue          ├── inflight   (permits, cancellation)
//!                                           └── observability (listeners, logs, metrics)
//! ```

pub mod config;
pub mod guard;
pub mod http;
pub mod inflight;
pub mod limits;
pub mod observability;
pub mod queue;
pub mod resilience;

pub use config::GuardConfig;
pub use guard::{Alert, BlockReason, Guard, GuardError, GuardResult, GuardSnapshot};
pub use http::GuardedClient;
pub use inflight::Permit;
pub use queue::RequestQueue;
