//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Before a request:
//!     → pause.rs (open circuit? active pause? window at limit?)
//!
//! After a response:
//!     → circuit_breaker.rs (429 increments, success decrements)
//!     → open circuit once failures_to_open is reached
//!
//! Caller side:
//!     → backoff.rs (jittered delay before retrying a cancelled request)
//! ```
//!
//! # Design Decisions
//! - Preventive pause and circuit breaker have independent exits
//! - Both blocking states have hard deadlines, so the guard never sticks
//! - No retries inside the guard; retrying is the caller's decision

pub mod backoff;
pub mod circuit_breaker;
pub mod pause;

pub use circuit_breaker::{CircuitBreaker, CircuitState, FailureCounter};
pub use pause::{PauseController, PauseState, Transition};
