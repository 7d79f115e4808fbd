//! Events pushed to rider and captain sessions.
//!
//! Serialized as `{"event": "<name>", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CaptainId, GeoPoint, Place, RideCode, RideId, VehicleClass};
use crate::pricing::FareBreakdown;

/// An offer sent to a candidate captain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideOffer {
    pub ride_id: RideId,
    pub code: RideCode,
    pub vehicle_class: VehicleClass,
    pub pickup: Place,
    pub destination: Place,
    pub fare_total: f64,
    pub captain_earnings: f64,
    /// Distance from the captain to the pickup.
    pub pickup_distance_km: f64,
    pub pickup_eta_min: f64,
    /// When the offer lapses if nobody accepts.
    pub expires_at: DateTime<Utc>,
}

/// The captain as shown to the rider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptainSummary {
    pub id: CaptainId,
    pub name: String,
    pub vehicle_class: VehicleClass,
    pub rating: f64,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum RideEvent {
    #[serde(rename = "ride:new-request")]
    NewRequest(RideOffer),

    #[serde(rename = "ride:taken")]
    Taken { ride_id: RideId },

    #[serde(rename = "ride:accepted")]
    Accepted {
        ride_id: RideId,
        captain: CaptainSummary,
        eta_min: f64,
    },

    #[serde(rename = "ride:captain-arriving")]
    CaptainArriving { ride_id: RideId, eta_min: f64 },

    /// Carries the one-time code, and is only ever sent to the rider.
    #[serde(rename = "ride:captain-arrived")]
    CaptainArrived { ride_id: RideId, otp: String },

    #[serde(rename = "ride:started")]
    Started {
        ride_id: RideId,
        at: DateTime<Utc>,
    },

    #[serde(rename = "ride:completed")]
    Completed {
        ride_id: RideId,
        fare: FareBreakdown,
    },

    #[serde(rename = "ride:cancelled")]
    Cancelled {
        ride_id: RideId,
        reason: String,
        fee: f64,
        /// Role of the canceller; `None` for the system.
        by: Option<&'static str>,
        /// The ride went back to searching rather than ending.
        requeued: bool,
    },

    #[serde(rename = "captain:location")]
    CaptainLocation {
        ride_id: RideId,
        location: GeoPoint,
        at: DateTime<Utc>,
    },
}

impl RideEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RideEvent::NewRequest(_) => "ride:new-request",
            RideEvent::Taken { .. } => "ride:taken",
            RideEvent::Accepted { .. } => "ride:accepted",
            RideEvent::CaptainArriving { .. } => "ride:captain-arriving",
            RideEvent::CaptainArrived { .. } => "ride:captain-arrived",
            RideEvent::Started { .. } => "ride:started",
            RideEvent::Completed { .. } => "ride:completed",
            RideEvent::Cancelled { .. } => "ride:cancelled",
            RideEvent::CaptainLocation { .. } => "captain:location",
        }
    }
}
