//! The ride entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directions::Route;
use crate::domain::{
    Actor, CaptainId, GeoPoint, OneTimeCode, PaymentMethod, PaymentStatus, Place, RideCode,
    RideId, RiderId, VehicleClass,
};
use crate::pricing::FareBreakdown;

use super::RideStatus;

/// One trip request progressing through the lifecycle.
///
/// Mutated only through the lifecycle methods in `lifecycle.rs`, and
/// persisted only through conditional commits against `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub code: RideCode,
    /// Incremented by the store on every committed write.
    pub version: u64,
    pub rider: RiderId,
    pub captain: Option<CaptainId>,
    pub vehicle_class: VehicleClass,
    pub pickup: Place,
    pub destination: Place,
    pub route: Route,
    pub fare: FareBreakdown,
    pub payment: Payment,
    pub otp: OneTimeCode,
    pub status: RideStatus,
    pub timestamps: RideTimestamps,
    /// Start of the current matching episode. Moves forward on requeue.
    pub searching_since: DateTime<Utc>,
    pub cancellation: Option<Cancellation>,
    pub ratings: RideRatings,
    pub coupon: Option<AppliedCoupon>,
    pub surge_multiplier: f64,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Captains holding the current offer.
    pub offered_to: Vec<CaptainId>,
    pub requeues: Vec<Requeue>,
    pub tip_total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

/// When each transition happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RideTimestamps {
    pub requested_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arriving_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl RideTimestamps {
    /// The most recent stamp of any kind.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        [
            self.requested_at,
            self.accepted_at,
            self.arriving_at,
            self.arrived_at,
            self.started_at,
            self.completed_at,
            self.cancelled_at,
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    /// `None` when the system expired the ride.
    pub by: Option<Actor>,
    pub reason: String,
    pub fee: f64,
    /// The captain who held the ride at cancellation, if any.
    pub captain: Option<CaptainId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub stars: u8,
    pub comment: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RideRatings {
    /// The rider's rating of the captain.
    pub by_rider: Option<Rating>,
    /// The captain's rating of the rider.
    pub by_captain: Option<Rating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount: f64,
}

/// A captain-initiated cancellation that sent the ride back to searching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requeue {
    pub captain: CaptainId,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// A location sample recorded while a captain is serving a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSample {
    pub point: GeoPoint,
    pub at: DateTime<Utc>,
}

/// Everything needed to create a ride in `searching`.
#[derive(Debug, Clone)]
pub struct RideDraft {
    pub code: RideCode,
    pub rider: RiderId,
    pub vehicle_class: VehicleClass,
    pub pickup: Place,
    pub destination: Place,
    pub route: Route,
    pub fare: FareBreakdown,
    pub payment_method: PaymentMethod,
    pub otp: OneTimeCode,
    pub coupon: Option<AppliedCoupon>,
    pub surge_multiplier: f64,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl Ride {
    /// Materialise a draft as a new `searching` ride.
    ///
    /// The id and version are placeholders until the store inserts it.
    pub fn from_draft(draft: RideDraft, now: DateTime<Utc>) -> Self {
        let searching_since = draft.scheduled_at.filter(|at| *at > now).unwrap_or(now);
        Self {
            id: RideId(0),
            code: draft.code,
            version: 0,
            rider: draft.rider,
            captain: None,
            vehicle_class: draft.vehicle_class,
            pickup: draft.pickup,
            destination: draft.destination,
            route: draft.route,
            fare: draft.fare,
            payment: Payment {
                method: draft.payment_method,
                status: PaymentStatus::Pending,
            },
            otp: draft.otp,
            status: RideStatus::Searching,
            timestamps: RideTimestamps {
                requested_at: Some(now),
                ..RideTimestamps::default()
            },
            searching_since,
            cancellation: None,
            ratings: RideRatings::default(),
            coupon: draft.coupon,
            surge_multiplier: draft.surge_multiplier,
            scheduled_at: draft.scheduled_at,
            offered_to: Vec::new(),
            requeues: Vec::new(),
            tip_total: 0.0,
        }
    }

    /// Whether `actor` is the ride's rider or its assigned captain.
    pub fn involves(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Rider(id) => *id == self.rider,
            Actor::Captain(id) => self.captain == Some(*id),
            Actor::Admin(_) => false,
        }
    }

    /// Whether `actor` may read this ride. Captains holding the current offer
    /// may read it too.
    pub fn visible_to(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Admin(_) => true,
            Actor::Captain(id) => self.involves(actor) || self.offered_to.contains(id),
            Actor::Rider(_) => self.involves(actor),
        }
    }

    /// Whether the scheduled pickup time is still ahead of `now`.
    pub fn is_scheduled_after(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_some_and(|at| at > now)
    }
}
