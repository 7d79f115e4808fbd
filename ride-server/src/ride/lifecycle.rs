//! Lifecycle transitions.
//!
//! Each method checks its guard against the ride's current state and either
//! applies the whole effect or returns an error with the ride untouched.
//! They are pure: persistence and notifications are the dispatcher's job.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Actor, CaptainId, DomainError, PaymentStatus, RiderId};
use crate::pricing::{FareBreakdown, round_cents};

use super::{
    Cancellation, CancellationPolicy, LedgerError, Rating, Requeue, Ride, RideStatus,
};

/// Reason recorded when the matching deadline passes.
pub const NO_CAPTAIN_REASON: &str = "no captain available";

const MAX_TEXT_LEN: usize = 500;

/// What a successful cancel did.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// The ride is terminal. `released` is the captain to free, if any.
    Cancelled {
        fee: f64,
        released: Option<CaptainId>,
    },
    /// The captain backed out; the ride is searching again.
    Requeued { captain: CaptainId },
}

/// Whose rating changed as a result of `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatedParty {
    Captain(CaptainId),
    Rider(RiderId),
}

fn clip(text: &str) -> String {
    text.trim().chars().take(MAX_TEXT_LEN).collect()
}

impl Ride {
    /// A stamp for `now` that never precedes an earlier stamp on this ride.
    fn stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.timestamps.latest() {
            Some(latest) if latest > now => latest,
            _ => now,
        }
    }

    fn require_status(
        &self,
        operation: &'static str,
        allowed: &[RideStatus],
    ) -> Result<(), LedgerError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(LedgerError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }

    fn require_captain(&self, captain: CaptainId) -> Result<(), LedgerError> {
        if self.captain == Some(captain) {
            Ok(())
        } else {
            Err(LedgerError::NotAParty(Actor::Captain(captain).to_string()))
        }
    }

    /// `searching → accepted`. Captain availability is checked by the store
    /// in the same commit.
    ///
    /// A scheduled ride cannot be claimed before its pickup time.
    pub fn accept(&mut self, captain: CaptainId, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.status != RideStatus::Searching {
            return Err(LedgerError::NoLongerAvailable);
        }
        if let Some(at) = self.scheduled_at.filter(|at| *at > now) {
            return Err(LedgerError::Scheduled(at));
        }
        let at = self.stamp(now);
        self.captain = Some(captain);
        self.status = RideStatus::Accepted;
        self.timestamps.accepted_at = Some(at);
        Ok(())
    }

    /// `accepted → arriving`.
    pub fn set_arriving(
        &mut self,
        captain: CaptainId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.require_status("mark arriving", &[RideStatus::Accepted])?;
        self.require_captain(captain)?;
        let at = self.stamp(now);
        self.status = RideStatus::Arriving;
        self.timestamps.arriving_at = Some(at);
        Ok(())
    }

    /// `accepted | arriving → arrived`.
    pub fn mark_arrived(
        &mut self,
        captain: CaptainId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.require_status("mark arrived", &[RideStatus::Accepted, RideStatus::Arriving])?;
        self.require_captain(captain)?;
        let at = self.stamp(now);
        self.status = RideStatus::Arrived;
        self.timestamps.arrived_at = Some(at);
        Ok(())
    }

    /// `arrived → started`, gated on the one-time code.
    pub fn start(
        &mut self,
        captain: CaptainId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.require_status("start", &[RideStatus::Arrived])?;
        self.require_captain(captain)?;
        if !self.otp.matches(code) {
            return Err(LedgerError::InvalidCode);
        }
        let at = self.stamp(now);
        self.otp.mark_verified();
        self.status = RideStatus::Started;
        self.timestamps.started_at = Some(at);
        Ok(())
    }

    /// `started → completed` with the final (adjusted) fare.
    pub fn complete(
        &mut self,
        captain: CaptainId,
        final_fare: FareBreakdown,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.require_status("complete", &[RideStatus::Started])?;
        self.require_captain(captain)?;
        let at = self.stamp(now);
        self.fare = final_fare;
        self.payment.status = PaymentStatus::Completed;
        self.status = RideStatus::Completed;
        self.timestamps.completed_at = Some(at);
        Ok(())
    }

    /// Cancel on behalf of `actor`.
    ///
    /// A captain backing out of a ride that has not started sends it back to
    /// `searching` instead of terminating it.
    pub fn cancel(
        &mut self,
        actor: &Actor,
        reason: &str,
        policy: &CancellationPolicy,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, LedgerError> {
        if self.status == RideStatus::Cancelled {
            return Err(LedgerError::AlreadyCancelled);
        }
        if !self.status.is_cancellable() {
            return Err(LedgerError::InvalidState {
                operation: "cancel",
                status: self.status,
            });
        }

        match actor {
            Actor::Rider(id) if *id != self.rider => {
                return Err(LedgerError::NotAParty(actor.to_string()));
            }
            Actor::Captain(id) => {
                self.require_captain(*id)?;
                return Ok(self.requeue(*id, reason, now));
            }
            _ => {}
        }

        let fee = policy.fee(actor, self.status, self.timestamps.accepted_at, now);
        let released = self.captain.take();
        let at = self.stamp(now);
        self.status = RideStatus::Cancelled;
        self.timestamps.cancelled_at = Some(at);
        self.cancellation = Some(Cancellation {
            by: Some(*actor),
            reason: clip(reason),
            fee,
            captain: released,
        });
        Ok(CancelOutcome::Cancelled { fee, released })
    }

    fn requeue(&mut self, captain: CaptainId, reason: &str, now: DateTime<Utc>) -> CancelOutcome {
        let at = self.stamp(now);
        self.requeues.push(Requeue {
            captain,
            reason: clip(reason),
            at,
        });
        self.captain = None;
        self.status = RideStatus::Searching;
        self.searching_since = at;
        self.timestamps.accepted_at = None;
        self.timestamps.arriving_at = None;
        self.timestamps.arrived_at = None;
        self.otp.reset();
        self.offered_to.clear();
        CancelOutcome::Requeued { captain }
    }

    /// `searching → cancelled` once the matching episode is older than
    /// `timeout`.
    pub fn expire(&mut self, timeout: Duration, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.require_status("expire", &[RideStatus::Searching])?;
        if now.signed_duration_since(self.searching_since) < timeout {
            return Err(LedgerError::NotDue);
        }
        let at = self.stamp(now);
        self.status = RideStatus::Cancelled;
        self.timestamps.cancelled_at = Some(at);
        self.cancellation = Some(Cancellation {
            by: None,
            reason: NO_CAPTAIN_REASON.to_string(),
            fee: 0.0,
            captain: None,
        });
        Ok(())
    }

    /// Record a post-completion rating from one side of the ride.
    pub fn rate(
        &mut self,
        actor: &Actor,
        stars: u8,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<RatedParty, LedgerError> {
        self.require_status("rate", &[RideStatus::Completed])?;
        if !(1..=5).contains(&stars) {
            return Err(DomainError::OutOfRange {
                field: "rating",
                value: f64::from(stars),
            }
            .into());
        }
        let rating = Rating {
            stars,
            comment: clip(comment),
            at: now,
        };

        match actor {
            Actor::Rider(id) if *id == self.rider => {
                let captain = self.captain.ok_or(LedgerError::InvalidState {
                    operation: "rate",
                    status: self.status,
                })?;
                if self.ratings.by_rider.is_some() {
                    return Err(LedgerError::AlreadyRated);
                }
                self.ratings.by_rider = Some(rating);
                Ok(RatedParty::Captain(captain))
            }
            Actor::Captain(id) if self.captain == Some(*id) => {
                if self.ratings.by_captain.is_some() {
                    return Err(LedgerError::AlreadyRated);
                }
                self.ratings.by_captain = Some(rating);
                Ok(RatedParty::Rider(self.rider))
            }
            _ => Err(LedgerError::NotAParty(actor.to_string())),
        }
    }

    /// Add a tip to a completed ride. Status is unaffected.
    pub fn add_tip(
        &mut self,
        rider: RiderId,
        amount: f64,
        max_tip: f64,
    ) -> Result<(), LedgerError> {
        self.require_status("tip", &[RideStatus::Completed])?;
        if rider != self.rider {
            return Err(LedgerError::NotAParty(Actor::Rider(rider).to_string()));
        }
        if !amount.is_finite() || amount <= 0.0 || amount > max_tip {
            return Err(DomainError::OutOfRange {
                field: "tip",
                value: amount,
            }
            .into());
        }
        self.tip_total = round_cents(self.tip_total + amount);
        Ok(())
    }
}
