//! Timing and money constants for the dispatcher.

use std::ops::RangeInclusive;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::ride::CancellationPolicy;

/// Configuration parameters for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How long a ride may search before it is cancelled (seconds).
    pub match_timeout_secs: i64,

    /// Rider cancellations within this long of acceptance are free (seconds).
    pub grace_window_secs: i64,

    /// Cancellation fee once a captain has accepted.
    pub fee_accepted: f64,

    /// Cancellation fee once the captain is on the way.
    pub fee_arriving: f64,

    /// Cancellation fee once the captain is at the pickup.
    pub fee_arrived: f64,

    /// Largest single tip accepted.
    pub max_tip: f64,

    /// Attempts at a conditional commit before reporting a conflict.
    pub commit_attempts: u32,

    /// How far ahead a ride may be scheduled (hours).
    pub max_schedule_ahead_hours: i64,

    /// How often the deadline supervisor wakes (milliseconds).
    pub supervisor_poll_ms: u64,

    /// Retry policy for wallet postings.
    pub wallet_retry: RetryPolicy,
}

/// Longest matching timeout or grace window accepted (one day).
const MAX_WINDOW_SECS: i64 = 86_400;
/// Furthest scheduling horizon accepted (one year).
const MAX_SCHEDULE_AHEAD_HOURS: i64 = 8_760;

impl DispatchConfig {
    /// Reject values the timers and date arithmetic cannot use.
    pub fn validate(&self) -> Result<(), String> {
        within("match_timeout_secs", self.match_timeout_secs, 1..=MAX_WINDOW_SECS)?;
        within("grace_window_secs", self.grace_window_secs, 0..=MAX_WINDOW_SECS)?;
        within(
            "max_schedule_ahead_hours",
            self.max_schedule_ahead_hours,
            0..=MAX_SCHEDULE_AHEAD_HOURS,
        )?;
        for (name, fee) in [
            ("fee_accepted", self.fee_accepted),
            ("fee_arriving", self.fee_arriving),
            ("fee_arrived", self.fee_arrived),
        ] {
            if !fee.is_finite() || fee < 0.0 {
                return Err(format!("{name} must be a non-negative amount, got {fee}"));
            }
        }
        if !self.max_tip.is_finite() || self.max_tip <= 0.0 {
            return Err(format!("max_tip must be positive, got {}", self.max_tip));
        }
        if self.supervisor_poll_ms == 0 {
            return Err("supervisor_poll_ms must be at least 1".to_string());
        }
        Ok(())
    }

    /// Returns the matching timeout as a Duration. Unvalidated values
    /// saturate rather than panic.
    pub fn match_timeout(&self) -> Duration {
        Duration::try_seconds(self.match_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Returns the cancellation grace window as a Duration.
    pub fn grace_window(&self) -> Duration {
        Duration::try_seconds(self.grace_window_secs).unwrap_or(Duration::MAX)
    }

    /// Returns the scheduling horizon as a Duration.
    pub fn max_schedule_ahead(&self) -> Duration {
        Duration::try_hours(self.max_schedule_ahead_hours).unwrap_or(Duration::MAX)
    }

    pub fn supervisor_poll(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.supervisor_poll_ms)
    }

    pub fn cancellation_policy(&self) -> CancellationPolicy {
        CancellationPolicy {
            grace_window: self.grace_window(),
            fee_accepted: self.fee_accepted,
            fee_arriving: self.fee_arriving,
            fee_arrived: self.fee_arrived,
        }
    }

    pub fn with_match_timeout_secs(mut self, secs: i64) -> Self {
        self.match_timeout_secs = secs;
        self
    }

    pub fn with_wallet_retry(mut self, retry: RetryPolicy) -> Self {
        self.wallet_retry = retry;
        self
    }
}

fn within(name: &str, value: i64, range: RangeInclusive<i64>) -> Result<(), String> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        ))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            match_timeout_secs: 60,
            grace_window_secs: 120,
            fee_accepted: 20.0,
            fee_arriving: 30.0,
            fee_arrived: 50.0,
            max_tip: 500.0,
            commit_attempts: 3,
            max_schedule_ahead_hours: 168,
            supervisor_poll_ms: 1000,
            wallet_retry: RetryPolicy::default(),
        }
    }
}
