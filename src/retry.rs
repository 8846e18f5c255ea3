// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use serde::Deserialize;
use std::time::Duration;

/// Controls how the watcher retries the handshake after a connection loss.
///
/// The default retries forever on a fixed one second interval.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    /// `None` retries until the supervisor is closed.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        let ms = interval.as_millis() as u64;
        Self {
            interval_ms: ms,
            max_interval_ms: ms,
            multiplier: 1.0,
            max_attempts: None,
        }
    }

    pub fn exponential(interval: Duration, max_interval: Duration, multiplier: f64) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            max_interval_ms: max_interval.as_millis() as u64,
            multiplier,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Delay before retry number `attempt`, counting from zero.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let calculated = (self.interval_ms as f64 * factor).min(u64::MAX as f64) as u64;
        let cap = self.max_interval_ms.max(self.interval_ms);
        Duration::from_millis(calculated.min(cap))
    }

    /// Whether `attempts` failed handshakes exhaust the policy.
    pub fn exhausted(&self, attempts: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}
