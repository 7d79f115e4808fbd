//! Offer fan-out and revocation.
//!
//! Offers go to every ranked candidate at once; the first valid accept wins
//! at the store. Revocations are a courtesy so losing captains can clear the
//! offer from their screen.

use chrono::{DateTime, Utc};

use crate::domain::{CaptainId, RideId};
use crate::locator::Candidate;
use crate::realtime::{EventSink, RideEvent, RideOffer, Room};
use crate::ride::Ride;

/// The offer one candidate sees.
pub(crate) fn offer_for(ride: &Ride, candidate: &Candidate, expires_at: DateTime<Utc>) -> RideOffer {
    RideOffer {
        ride_id: ride.id,
        code: ride.code,
        vehicle_class: ride.vehicle_class,
        pickup: ride.pickup.clone(),
        destination: ride.destination.clone(),
        fare_total: ride.fare.total,
        captain_earnings: ride.fare.captain_earnings,
        pickup_distance_km: candidate.distance_km,
        pickup_eta_min: candidate.eta_min,
        expires_at,
    }
}

/// Send the offer to every candidate. Returns how many sessions received it.
pub(crate) fn broadcast(
    events: &dyn EventSink,
    ride: &Ride,
    candidates: &[Candidate],
    expires_at: DateTime<Utc>,
) -> usize {
    let delivered = candidates
        .iter()
        .map(|candidate| {
            let event = RideEvent::NewRequest(offer_for(ride, candidate, expires_at));
            events.emit(Room::Captain(candidate.captain.id), &event)
        })
        .sum();
    tracing::debug!(
        ride = %ride.id,
        candidates = candidates.len(),
        delivered,
        "Broadcast offers"
    );
    delivered
}

/// Tell everyone in `pool` except `winner` that the ride is gone.
pub(crate) fn revoke(
    events: &dyn EventSink,
    ride: RideId,
    pool: &[CaptainId],
    winner: Option<CaptainId>,
) {
    let event = RideEvent::Taken { ride_id: ride };
    let mut revoked = 0;
    for captain in pool.iter().filter(|c| Some(**c) != winner) {
        events.emit(Room::Captain(*captain), &event);
        revoked += 1;
    }
    tracing::trace!(%ride, revoked, "Revoked offers");
}
