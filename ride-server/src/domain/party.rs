//! Riders and captains as seen by the dispatch core.
//!
//! Only the fields dispatch reads or writes live here; profiles, documents
//! and verification workflows belong to other services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CaptainId, GeoPoint, RiderId, VehicleClass};

/// Rating assumed for a party nobody has rated yet.
pub const DEFAULT_RATING: f64 = 5.0;

/// Outcome of the external document verification workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Captain {
    pub id: CaptainId,
    pub name: String,
    pub vehicle_class: VehicleClass,
    pub approval: ApprovalStatus,
    /// Written only by the captain's own session.
    pub online: bool,
    /// Written only by the dispatcher, as part of assign/release commits.
    pub on_ride: bool,
    /// Written only by the captain's own session.
    pub location: Option<GeoPoint>,
    pub rating: f64,
    /// Offers this captain accepted in the recent window.
    pub recent_accepts: u32,
    /// Accepted rides this captain later cancelled in the recent window.
    pub recent_cancellations: u32,
    pub updated_at: DateTime<Utc>,
}

impl Captain {
    /// A newly registered, offline captain.
    pub fn new(
        id: CaptainId,
        name: impl Into<String>,
        vehicle_class: VehicleClass,
        approval: ApprovalStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            vehicle_class,
            approval,
            online: false,
            on_ride: false,
            location: None,
            rating: DEFAULT_RATING,
            recent_accepts: 0,
            recent_cancellations: 0,
            updated_at: now,
        }
    }

    /// Whether this captain may be offered (or claim) a ride of `class`.
    pub fn is_available_for(&self, class: VehicleClass) -> bool {
        self.online
            && !self.on_ride
            && self.approval == ApprovalStatus::Approved
            && self.vehicle_class == class
    }

    /// Share of recent accepted rides that ended in a captain cancellation.
    pub fn cancellation_rate(&self) -> f64 {
        let total = self.recent_accepts + self.recent_cancellations;
        if total == 0 {
            return 0.0;
        }
        f64::from(self.recent_cancellations) / f64::from(total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    pub id: RiderId,
    pub name: String,
    pub rating: f64,
}

impl Rider {
    pub fn new(id: RiderId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            rating: DEFAULT_RATING,
        }
    }
}

/// Mean of `ratings` rounded to one decimal, or `None` when empty.
pub fn mean_rating<I: IntoIterator<Item = u8>>(ratings: I) -> Option<f64> {
    let (sum, count) = ratings
        .into_iter()
        .fold((0u64, 0u64), |(s, n), r| (s + u64::from(r), n + 1));
    if count == 0 {
        return None;
    }
    let mean = sum as f64 / count as f64;
    Some((mean * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captain() -> Captain {
        let mut c = Captain::new(
            CaptainId(1),
            "Asha",
            VehicleClass::Bike,
            ApprovalStatus::Approved,
            Utc::now(),
        );
        c.online = true;
        c
    }

    #[test]
    fn availability_requires_every_flag() {
        let c = captain();
        assert!(c.is_available_for(VehicleClass::Bike));
        assert!(!c.is_available_for(VehicleClass::Sedan));

        let mut busy = captain();
        busy.on_ride = true;
        assert!(!busy.is_available_for(VehicleClass::Bike));

        let mut offline = captain();
        offline.online = false;
        assert!(!offline.is_available_for(VehicleClass::Bike));

        let mut pending = captain();
        pending.approval = ApprovalStatus::Pending;
        assert!(!pending.is_available_for(VehicleClass::Bike));
    }

    #[test]
    fn cancellation_rate_handles_zero_history() {
        let mut c = captain();
        assert_eq!(c.cancellation_rate(), 0.0);
        c.recent_accepts = 3;
        c.recent_cancellations = 1;
        assert!((c.cancellation_rate() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn mean_rating_rounds_to_one_decimal() {
        assert_eq!(mean_rating([]), None);
        assert_eq!(mean_rating([5]), Some(5.0));
        assert_eq!(mean_rating([5, 4, 4]), Some(4.3));
        assert_eq!(mean_rating([1, 2]), Some(1.5));
    }
}
