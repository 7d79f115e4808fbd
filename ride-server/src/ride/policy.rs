//! Cancellation fee policy.

use chrono::{DateTime, Duration, Utc};

use crate::domain::Actor;

use super::RideStatus;

/// Decides what a cancellation costs.
///
/// The grace window is measured from the acceptance stamp at cancel time;
/// nothing is pre-scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationPolicy {
    pub grace_window: Duration,
    pub fee_accepted: f64,
    pub fee_arriving: f64,
    pub fee_arrived: f64,
}

impl CancellationPolicy {
    /// Fee charged to the rider for cancelling a ride in `status`.
    pub fn fee(
        &self,
        actor: &Actor,
        status: RideStatus,
        accepted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> f64 {
        if !matches!(actor, Actor::Rider(_)) {
            return 0.0;
        }
        if status == RideStatus::Searching {
            return 0.0;
        }
        if let Some(accepted_at) = accepted_at
            && now.signed_duration_since(accepted_at) <= self.grace_window
        {
            return 0.0;
        }
        match status {
            RideStatus::Accepted => self.fee_accepted,
            RideStatus::Arriving => self.fee_arriving,
            RideStatus::Arrived => self.fee_arrived,
            _ => 0.0,
        }
    }
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            grace_window: Duration::minutes(2),
            fee_accepted: 20.0,
            fee_arriving: 30.0,
            fee_arrived: 50.0,
        }
    }
}
