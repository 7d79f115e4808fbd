//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Actor, ApprovalStatus, Captain, CaptainId, GeoPoint, Place, RideCode, RideId, RiderId,
    VehicleClass,
};
use crate::pricing::FareBreakdown;
use crate::ride::{
    AppliedCoupon, Cancellation, Payment, Ride, RideRatings, RideStatus, RideTimestamps,
    TrackingSample,
};

/// Request to start a ride.
#[derive(Debug, Deserialize)]
pub struct StartRideRequest {
    /// The one-time code the rider read out
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRideRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RateRideRequest {
    /// Stars, 1 to 5
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct TipRequest {
    pub amount: f64,
}

/// A captain's position, as sent by the captain app.
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub location: GeoPoint,
}

#[derive(Debug, Deserialize)]
pub struct RegisterCaptainRequest {
    pub id: CaptainId,
    pub name: String,
    pub vehicle_class: VehicleClass,
    #[serde(default)]
    pub approval: ApprovalStatus,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRiderRequest {
    pub id: RiderId,
    pub name: String,
}

/// Query parameters for the WebSocket endpoint.
///
/// Browsers cannot set headers on a WebSocket handshake, so the actor may
/// be passed here instead.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub actor: Option<String>,
}

/// A ride as shown to one of its parties.
#[derive(Debug, Serialize)]
pub struct RideView {
    pub id: RideId,
    pub code: RideCode,
    pub status: RideStatus,
    pub rider: RiderId,
    pub captain: Option<CaptainId>,
    pub vehicle_class: VehicleClass,
    pub pickup: Place,
    pub destination: Place,
    pub distance_km: f64,
    pub duration_min: f64,
    pub fare: FareBreakdown,
    pub surge_multiplier: f64,
    pub payment: Payment,
    /// Only the rider sees the code, and only until the trip starts.
    pub otp: Option<String>,
    pub timestamps: RideTimestamps,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub cancellation: Option<Cancellation>,
    pub ratings: RideRatings,
    pub coupon: Option<AppliedCoupon>,
    pub tip_total: f64,
    pub requeue_count: usize,
}

impl RideView {
    /// Create from a domain ride, redacted for `viewer`.
    pub fn for_viewer(ride: &Ride, viewer: &Actor) -> Self {
        let shows_code = matches!(viewer, Actor::Rider(id) if *id == ride.rider)
            && !ride.otp.is_verified()
            && !ride.status.is_terminal();
        Self {
            id: ride.id,
            code: ride.code,
            status: ride.status,
            rider: ride.rider,
            captain: ride.captain,
            vehicle_class: ride.vehicle_class,
            pickup: ride.pickup.clone(),
            destination: ride.destination.clone(),
            distance_km: ride.route.distance_km,
            duration_min: ride.route.duration_min,
            fare: ride.fare.clone(),
            surge_multiplier: ride.surge_multiplier,
            payment: ride.payment,
            otp: shows_code.then(|| ride.otp.value().to_string()),
            timestamps: ride.timestamps.clone(),
            scheduled_at: ride.scheduled_at,
            cancellation: ride.cancellation.clone(),
            ratings: ride.ratings.clone(),
            coupon: ride.coupon.clone(),
            tip_total: ride.tip_total,
            requeue_count: ride.requeues.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActiveRideResponse {
    pub ride: Option<RideView>,
}

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub ride_id: RideId,
    pub samples: Vec<TrackingSample>,
}

/// A captain's own session state.
#[derive(Debug, Serialize)]
pub struct CaptainStatusResponse {
    pub id: CaptainId,
    pub online: bool,
    pub on_ride: bool,
    pub location: Option<GeoPoint>,
    pub rating: f64,
}

impl From<&Captain> for CaptainStatusResponse {
    fn from(captain: &Captain) -> Self {
        Self {
            id: captain.id,
            online: captain.online,
            on_ride: captain.on_ride,
            location: captain.location,
            rating: captain.rating,
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
