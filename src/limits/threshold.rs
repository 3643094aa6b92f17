//! Classification of window usage against the configured thresholds.

use serde::Serialize;

use crate::config::WindowConfig;

/// How close the current window is to the server ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLevel {
    Normal,
    /// Advisory only.
    NearLimit,
    /// The pause controller blocks at this level.
    AtLimit,
}

/// Absolute-count thresholds for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: u32,
    pub block: u32,
    pub max_requests: u32,
}

impl Thresholds {
    pub fn from_config(config: &WindowConfig) -> Self {
        Self {
            warning: config.warning_threshold,
            block: config.block_threshold,
            max_requests: config.max_requests,
        }
    }

    pub fn evaluate(&self, count: u32) -> ThresholdLevel {
        if count >= self.block {
            ThresholdLevel::AtLimit
        } else if count >= self.warning {
            ThresholdLevel::NearLimit
        } else {
            ThresholdLevel::Normal
        }
    }
}
