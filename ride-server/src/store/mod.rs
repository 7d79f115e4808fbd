//! Persistence for rides, parties, tracking logs and durable deadlines.
//!
//! Every ride write is a conditional commit against the version the writer
//! read. A commit may also carry one captain effect (claim or release) that
//! the store applies in the same atomic step, so a captain's busy flag never
//! disagrees with the ride that holds them.

mod error;
mod memory;
mod snapshot;
mod spatial;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use snapshot::SnapshotFile;
pub use spatial::CaptainIndex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::{Actor, Captain, CaptainId, GeoPoint, RideId, Rider, RiderId, VehicleClass};
use crate::ride::{Ride, TrackingSample};

/// Captain-side effect applied atomically with a ride write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptainEffect {
    /// Mark the captain busy. Fails unless the captain is available for
    /// `class`.
    Claim {
        captain: CaptainId,
        class: VehicleClass,
    },
    /// Free the captain. `penalize` counts a captain-initiated cancellation.
    Release { captain: CaptainId, penalize: bool },
}

/// A conditional ride write.
#[derive(Debug, Clone)]
pub struct RideCommit {
    pub ride: Ride,
    /// The version the writer read; the commit fails if it moved on.
    pub expected_version: u64,
    pub captain: Option<CaptainEffect>,
}

impl RideCommit {
    /// Commit `ride` against the version it carries.
    pub fn new(ride: Ride) -> Self {
        let expected_version = ride.version;
        Self {
            ride,
            expected_version,
            captain: None,
        }
    }

    pub fn with_effect(mut self, effect: CaptainEffect) -> Self {
        self.captain = Some(effect);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineKind {
    /// Start matching a scheduled ride.
    Dispatch,
    /// Cancel the ride if still searching.
    Expire,
}

/// A persisted timer. At most one per `(ride, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    pub ride: RideId,
    pub kind: DeadlineKind,
    pub due_at: DateTime<Utc>,
}

/// A write from the captain's own session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionUpdate {
    GoOnline(GeoPoint),
    GoOffline,
    Location(GeoPoint),
}

/// A captain within a search radius.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyCaptain {
    pub captain: Captain,
    pub distance_km: f64,
}

/// Storage collaborator used by the dispatcher.
pub trait RideStore: Send + Sync {
    /// Persist a new ride, assigning its id and version 1.
    ///
    /// Fails with [`StoreError::RiderBusy`] if the rider already holds an
    /// active ride; the check and the insert are one atomic step.
    fn insert_ride(&self, ride: Ride) -> BoxFuture<'_, Result<Ride, StoreError>>;

    fn ride(&self, id: RideId) -> BoxFuture<'_, Result<Ride, StoreError>>;

    /// The ride currently blocking `actor`, if any.
    fn active_ride(&self, actor: Actor) -> BoxFuture<'_, Result<Option<Ride>, StoreError>>;

    /// Conditionally write a ride (and its captain effect).
    ///
    /// Returns the stored ride with its new version.
    fn commit(&self, commit: RideCommit) -> BoxFuture<'_, Result<Ride, StoreError>>;

    /// All rides currently in `searching`.
    fn searching_rides(&self) -> BoxFuture<'_, Result<Vec<Ride>, StoreError>>;

    /// Most recently requested rides first.
    fn recent_rides(&self, limit: usize) -> BoxFuture<'_, Result<Vec<Ride>, StoreError>>;

    /// Searching rides of `class` within `radius_km` whose matching episode
    /// began in `[since, until]`.
    fn count_searching_near(
        &self,
        point: GeoPoint,
        class: VehicleClass,
        radius_km: f64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<usize, StoreError>>;

    /// Append a location sample if `captain` holds the ride and it is inside
    /// its tracking window.
    fn append_tracking(
        &self,
        ride: RideId,
        captain: CaptainId,
        sample: TrackingSample,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    fn tracking(&self, ride: RideId) -> BoxFuture<'_, Result<Vec<TrackingSample>, StoreError>>;

    fn upsert_captain(&self, captain: Captain) -> BoxFuture<'_, Result<(), StoreError>>;

    fn upsert_rider(&self, rider: Rider) -> BoxFuture<'_, Result<(), StoreError>>;

    fn captain(&self, id: CaptainId) -> BoxFuture<'_, Result<Captain, StoreError>>;

    fn rider(&self, id: RiderId) -> BoxFuture<'_, Result<Rider, StoreError>>;

    /// Apply a session write and return the updated captain.
    fn update_session(
        &self,
        captain: CaptainId,
        update: SessionUpdate,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Captain, StoreError>>;

    /// Captains available for `class` within `radius_km` of `point`, unordered.
    fn available_captains_near(
        &self,
        point: GeoPoint,
        class: VehicleClass,
        radius_km: f64,
    ) -> BoxFuture<'_, Result<Vec<NearbyCaptain>, StoreError>>;

    /// Recompute a captain's rating from every rating they have received.
    fn refresh_captain_rating(&self, id: CaptainId) -> BoxFuture<'_, Result<f64, StoreError>>;

    /// Recompute a rider's rating from every rating they have received.
    fn refresh_rider_rating(&self, id: RiderId) -> BoxFuture<'_, Result<f64, StoreError>>;

    /// Insert or replace the deadline for `(deadline.ride, deadline.kind)`.
    fn put_deadline(&self, deadline: Deadline) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Remove `deadline` if it is still the one pending for its ride and
    /// kind. A deadline re-armed in the meantime is left alone.
    fn remove_deadline(&self, deadline: Deadline) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Remove every deadline for `ride`.
    fn clear_deadlines(&self, ride: RideId) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Every pending deadline, earliest first.
    fn deadlines(&self) -> BoxFuture<'_, Result<Vec<Deadline>, StoreError>>;
}
