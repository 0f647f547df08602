// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry with capped exponential backoff.
//
// Only failures that happen before any byte can reach the device are
// retried. Everything else is reported on the first attempt.

use std::time::Duration;

use tracing::{debug, warn};

use bonspool_core::SpoolConfig;
use bonspool_core::error::DeliveryErrorCode;
use bonspool_core::types::Printer;

/// How many extra attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

/// Outcome of asking the policy about a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after this delay.
    RetryAfter(Duration),
    /// The failure is not safe to retry.
    GiveUp,
    /// No attempts left.
    Exhausted,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Attempts come from the printer; delays from spool configuration.
    pub fn for_printer(printer: &Printer, config: &SpoolConfig) -> Self {
        Self {
            retries: printer.retry_attempts,
            ..Self::from_config(config)
        }
    }

    /// Delays from configuration with no retries; callers set `retries`.
    pub fn from_config(config: &SpoolConfig) -> Self {
        Self {
            retries: 0,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Decide what to do after failed attempt number `attempt` (0-based).
    pub fn decide(&self, transient: bool, attempt: u32) -> RetryDecision {
        if !transient {
            return RetryDecision::GiveUp;
        }
        if attempt >= self.retries {
            if self.retries > 0 {
                warn!(attempt, max = self.retries, "retry limit exhausted");
            }
            return RetryDecision::Exhausted;
        }
        let delay = self.delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
        RetryDecision::RetryAfter(delay)
    }

    /// Convenience for raw delivery failures.
    pub fn decide_delivery(&self, code: DeliveryErrorCode, attempt: u32) -> RetryDecision {
        self.decide(code.is_transient(), attempt)
    }

    /// `min(base * 2^attempt + jitter, max)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
        Duration::from_millis(total_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Deterministic spread in `[0, base / 4)`.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let spread = (base_ms / 4).max(1);
    (u64::from(attempt) + 1).wrapping_mul(6364136223846793005) % spread
}
