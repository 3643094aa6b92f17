//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for a guard instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Request window and thresholds.
    pub window: WindowConfig,

    /// Circuit breaker settings.
    pub circuit: CircuitConfig,

    /// What happens to requests issued while blocked.
    pub admission: AdmissionConfig,

    /// HTTP client settings.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Request window configuration.
///
/// Thresholds are absolute request counts within one window.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length in milliseconds.
    pub duration_ms: u64,

    /// Hard server-side ceiling per window.
    pub max_requests: u32,

    /// Count at which the guard reports it is near the limit.
    pub warning_threshold: u32,

    /// Count at which the guard stops admitting requests.
    pub block_threshold: u32,
}

impl WindowConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            duration_ms: 60_000,
            max_requests: 500,
            // 40% and 50% of the server ceiling
            warning_threshold: 200,
            block_threshold: 250,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitConfig {
    /// How long the circuit stays open, in milliseconds.
    pub cooldown_ms: u64,

    /// Overload responses (net of successes) that open the circuit.
    pub failures_to_open: u32,
}

impl CircuitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 30_000,
            failures_to_open: 2,
        }
    }
}

/// Behaviour for requests that arrive while the guard is blocking.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionMode {
    /// Fail immediately with `GuardError::Blocked`.
    #[default]
    Reject,
    /// Defer into the request queue and replay once unblocked.
    Queue,
}

/// Admission configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Reject or queue blocked requests.
    pub mode: AdmissionMode,

    /// Minimum spacing between queued request completions, in milliseconds.
    pub inter_request_delay_ms: u64,
}

impl AdmissionConfig {
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            mode: AdmissionMode::Reject,
            inter_request_delay_ms: 100,
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Backoff reported for a 429 without a usable `Retry-After`, in milliseconds.
    pub default_overload_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            default_overload_backoff_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
