//! In-flight request tracking.
//!
//! # Responsibilities
//! - Give every admitted request an identity and a cancellation token
//! - Abort everything in flight when the guard starts blocking
//! - Release the registration when the request resolves (RAII permit)
//!
//! # Design Decisions
//! - Cancellation is fire-and-forget; the guard never waits for acknowledgement
//! - The registry is cleared on every blocking transition, so it cannot grow unbounded

pub mod permit;
pub mod registry;

pub use permit::Permit;
pub use registry::{CancellationRegistry, RequestId};
