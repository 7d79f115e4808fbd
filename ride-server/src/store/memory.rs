//! In-process reference store.
//!
//! All state lives behind one `std::sync::Mutex`. Each operation takes the
//! lock, does its work synchronously and releases it before any await, so
//! every commit is atomic with respect to every other. When a snapshot file
//! is configured the state is serialized inside the critical section and
//! written to disk after it.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::domain::{
    Actor, ApprovalStatus, Captain, CaptainId, GeoPoint, RideId, Rider, RiderId, VehicleClass,
    mean_rating,
};
use crate::ride::{Ride, RideStatus, TrackingSample};

use super::snapshot::{PendingSnapshot, Snapshot, SnapshotFile};
use super::spatial::CaptainIndex;
use super::{
    CaptainEffect, Deadline, DeadlineKind, NearbyCaptain, RideCommit, RideStore, SessionUpdate,
    StoreError,
};

#[derive(Debug)]
struct State {
    next_ride_id: u64,
    generation: u64,
    rides: HashMap<RideId, Ride>,
    captains: HashMap<CaptainId, Captain>,
    riders: HashMap<RiderId, Rider>,
    tracking: HashMap<RideId, Vec<TrackingSample>>,
    deadlines: HashMap<(RideId, DeadlineKind), Deadline>,

    // Derived indexes, rebuilt on load.
    active_by_rider: HashMap<RiderId, RideId>,
    active_by_captain: HashMap<CaptainId, RideId>,
    searching: HashSet<RideId>,
    locations: CaptainIndex,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_ride_id: 1,
            generation: 0,
            rides: HashMap::new(),
            captains: HashMap::new(),
            riders: HashMap::new(),
            tracking: HashMap::new(),
            deadlines: HashMap::new(),
            active_by_rider: HashMap::new(),
            active_by_captain: HashMap::new(),
            searching: HashSet::new(),
            locations: CaptainIndex::new(),
        }
    }
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = State {
            next_ride_id: snapshot.next_ride_id.max(1),
            ..State::default()
        };
        for captain in snapshot.captains {
            state.locations.update(captain.id, captain.location);
            state.captains.insert(captain.id, captain);
        }
        for rider in snapshot.riders {
            state.riders.insert(rider.id, rider);
        }
        for ride in snapshot.rides {
            state.next_ride_id = state.next_ride_id.max(ride.id.0 + 1);
            state.reindex(None, &ride);
            state.rides.insert(ride.id, ride);
        }
        state.tracking = snapshot.tracking.into_iter().collect();
        state.deadlines = snapshot
            .deadlines
            .into_iter()
            .map(|d| ((d.ride, d.kind), d))
            .collect();
        state
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut rides: Vec<Ride> = self.rides.values().cloned().collect();
        rides.sort_by_key(|r| r.id);
        let mut captains: Vec<Captain> = self.captains.values().cloned().collect();
        captains.sort_by_key(|c| c.id);
        let mut riders: Vec<Rider> = self.riders.values().cloned().collect();
        riders.sort_by_key(|r| r.id);
        let mut tracking: Vec<(RideId, Vec<TrackingSample>)> = self
            .tracking
            .iter()
            .map(|(id, samples)| (*id, samples.clone()))
            .collect();
        tracking.sort_by_key(|(id, _)| *id);

        Snapshot {
            next_ride_id: self.next_ride_id,
            rides,
            captains,
            riders,
            tracking,
            deadlines: self.sorted_deadlines(),
        }
    }

    fn pending_snapshot(&mut self) -> Option<PendingSnapshot> {
        self.generation += 1;
        match serde_json::to_string(&self.to_snapshot()) {
            Ok(json) => Some(PendingSnapshot {
                generation: self.generation,
                json,
            }),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize store snapshot");
                None
            }
        }
    }

    /// Bring the derived indexes in line with `ride`'s new state.
    fn reindex(&mut self, previous_captain: Option<CaptainId>, ride: &Ride) {
        let id = ride.id;
        let active = ride.status.is_active();

        if active {
            self.active_by_rider.insert(ride.rider, id);
        } else if self.active_by_rider.get(&ride.rider) == Some(&id) {
            self.active_by_rider.remove(&ride.rider);
        }

        if let Some(prev) = previous_captain
            && self.active_by_captain.get(&prev) == Some(&id)
        {
            self.active_by_captain.remove(&prev);
        }
        if let Some(captain) = ride.captain
            && active
        {
            self.active_by_captain.insert(captain, id);
        }

        if ride.status == RideStatus::Searching {
            self.searching.insert(id);
        } else {
            self.searching.remove(&id);
        }
    }

    fn apply_effect(&mut self, effect: CaptainEffect) -> Result<(), StoreError> {
        match effect {
            CaptainEffect::Claim { captain, class } => {
                let busy = self.active_by_captain.contains_key(&captain);
                let record = self
                    .captains
                    .get_mut(&captain)
                    .ok_or(StoreError::CaptainNotFound(captain))?;
                let reason = if !record.online {
                    Some("offline")
                } else if record.on_ride || busy {
                    Some("already on a ride")
                } else if record.approval != ApprovalStatus::Approved {
                    Some("not approved")
                } else if record.vehicle_class != class {
                    Some("vehicle class mismatch")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(StoreError::CaptainUnavailable { captain, reason });
                }
                record.on_ride = true;
                record.recent_accepts += 1;
            }
            CaptainEffect::Release { captain, penalize } => {
                let record = self
                    .captains
                    .get_mut(&captain)
                    .ok_or(StoreError::CaptainNotFound(captain))?;
                record.on_ride = false;
                if penalize {
                    record.recent_cancellations += 1;
                }
            }
        }
        Ok(())
    }

    fn ride(&self, id: RideId) -> Result<&Ride, StoreError> {
        self.rides.get(&id).ok_or(StoreError::RideNotFound(id))
    }

    fn sorted_deadlines(&self) -> Vec<Deadline> {
        let mut deadlines: Vec<Deadline> = self.deadlines.values().copied().collect();
        deadlines.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.ride.cmp(&b.ride)));
        deadlines
    }
}

/// Reference [`RideStore`] kept in memory, optionally snapshotted to disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryStore {
    /// An empty store with no persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store backed by `file`, loading its contents if it exists.
    pub fn open(file: SnapshotFile) -> Result<Self, StoreError> {
        let state = match file.load()? {
            Some(snapshot) => {
                let state = State::from_snapshot(snapshot);
                tracing::info!(
                    path = %file.path().display(),
                    rides = state.rides.len(),
                    captains = state.captains.len(),
                    deadlines = state.deadlines.len(),
                    "Loaded store snapshot"
                );
                state
            }
            None => State::default(),
        };
        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(file),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let state = self.lock()?;
        f(&state)
    }

    /// Apply `f` atomically, then persist a snapshot if configured.
    async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut State) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let (value, pending) = {
            let mut state = self.lock()?;
            let value = f(&mut state)?;
            let pending = match self.snapshot {
                Some(_) => state.pending_snapshot(),
                None => None,
            };
            (value, pending)
        };

        if let (Some(file), Some(pending)) = (&self.snapshot, pending)
            && let Err(e) = file.write(pending).await
        {
            tracing::error!(path = %file.path().display(), error = %e, "Snapshot write failed");
        }
        Ok(value)
    }

    fn ratings_mean(state: &State, party: Actor) -> Option<f64> {
        mean_rating(state.rides.values().filter_map(|ride| match party {
            Actor::Captain(id) if ride.captain == Some(id) => {
                ride.ratings.by_rider.as_ref().map(|r| r.stars)
            }
            Actor::Rider(id) if ride.rider == id => {
                ride.ratings.by_captain.as_ref().map(|r| r.stars)
            }
            _ => None,
        }))
    }
}

impl RideStore for MemoryStore {
    fn insert_ride(&self, ride: Ride) -> BoxFuture<'_, Result<Ride, StoreError>> {
        Box::pin(self.write(move |state| {
            if state.active_by_rider.contains_key(&ride.rider) {
                return Err(StoreError::RiderBusy(ride.rider));
            }
            let mut ride = ride;
            ride.id = RideId(state.next_ride_id);
            ride.version = 1;
            state.next_ride_id += 1;
            state.reindex(None, &ride);
            state.rides.insert(ride.id, ride.clone());
            Ok(ride)
        }))
    }

    fn ride(&self, id: RideId) -> BoxFuture<'_, Result<Ride, StoreError>> {
        Box::pin(async move { self.read(|state| state.ride(id).cloned()) })
    }

    fn active_ride(&self, actor: Actor) -> BoxFuture<'_, Result<Option<Ride>, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                let id = match actor {
                    Actor::Rider(rider) => state.active_by_rider.get(&rider),
                    Actor::Captain(captain) => state.active_by_captain.get(&captain),
                    Actor::Admin(_) => None,
                };
                Ok(id.and_then(|id| state.rides.get(id)).cloned())
            })
        })
    }

    fn commit(&self, commit: RideCommit) -> BoxFuture<'_, Result<Ride, StoreError>> {
        Box::pin(self.write(move |state| {
            let id = commit.ride.id;
            let current = state.ride(id)?;
            if current.version != commit.expected_version {
                return Err(StoreError::VersionMismatch {
                    ride: id,
                    expected: commit.expected_version,
                    actual: current.version,
                });
            }
            let previous_captain = current.captain;

            if let Some(effect) = commit.captain {
                state.apply_effect(effect)?;
            }

            let mut ride = commit.ride;
            ride.version = commit.expected_version + 1;
            state.reindex(previous_captain, &ride);
            state.rides.insert(id, ride.clone());
            Ok(ride)
        }))
    }

    fn searching_rides(&self) -> BoxFuture<'_, Result<Vec<Ride>, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                let mut rides: Vec<Ride> = state
                    .searching
                    .iter()
                    .filter_map(|id| state.rides.get(id))
                    .cloned()
                    .collect();
                rides.sort_by_key(|r| r.id);
                Ok(rides)
            })
        })
    }

    fn recent_rides(&self, limit: usize) -> BoxFuture<'_, Result<Vec<Ride>, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                let mut rides: Vec<&Ride> = state.rides.values().collect();
                rides.sort_by(|a, b| b.id.cmp(&a.id));
                Ok(rides.into_iter().take(limit).cloned().collect())
            })
        })
    }

    fn count_searching_near(
        &self,
        point: GeoPoint,
        class: VehicleClass,
        radius_km: f64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<usize, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                let count = state
                    .searching
                    .iter()
                    .filter_map(|id| state.rides.get(id))
                    .filter(|ride| {
                        ride.vehicle_class == class
                            && ride.searching_since >= since
                            && ride.searching_since <= until
                            && ride.pickup.point.distance_km(&point) <= radius_km
                    })
                    .count();
                Ok(count)
            })
        })
    }

    fn append_tracking(
        &self,
        ride: RideId,
        captain: CaptainId,
        sample: TrackingSample,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.write(move |state| {
            let current = state.ride(ride)?;
            if current.captain != Some(captain) || !current.status.accepts_tracking() {
                return Err(StoreError::NotTracking(ride));
            }
            state.tracking.entry(ride).or_default().push(sample);
            Ok(())
        }))
    }

    fn tracking(&self, ride: RideId) -> BoxFuture<'_, Result<Vec<TrackingSample>, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                state.ride(ride)?;
                Ok(state.tracking.get(&ride).cloned().unwrap_or_default())
            })
        })
    }

    fn upsert_captain(&self, captain: Captain) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.write(move |state| {
            // Re-registration only touches the profile; presence, position,
            // the busy flag and the reputation counters stay with the session.
            if let Some(existing) = state.captains.get_mut(&captain.id) {
                existing.name = captain.name;
                existing.vehicle_class = captain.vehicle_class;
                existing.approval = captain.approval;
                return Ok(());
            }
            state.locations.update(captain.id, captain.location);
            state.captains.insert(captain.id, captain);
            Ok(())
        }))
    }

    fn upsert_rider(&self, rider: Rider) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.write(move |state| {
            state.riders.insert(rider.id, rider);
            Ok(())
        }))
    }

    fn captain(&self, id: CaptainId) -> BoxFuture<'_, Result<Captain, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                state
                    .captains
                    .get(&id)
                    .cloned()
                    .ok_or(StoreError::CaptainNotFound(id))
            })
        })
    }

    fn rider(&self, id: RiderId) -> BoxFuture<'_, Result<Rider, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                state
                    .riders
                    .get(&id)
                    .cloned()
                    .ok_or(StoreError::RiderNotFound(id))
            })
        })
    }

    fn update_session(
        &self,
        captain: CaptainId,
        update: SessionUpdate,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Captain, StoreError>> {
        Box::pin(self.write(move |state| {
            let record = state
                .captains
                .get_mut(&captain)
                .ok_or(StoreError::CaptainNotFound(captain))?;
            match update {
                SessionUpdate::GoOnline(location) => {
                    record.online = true;
                    record.location = Some(location);
                }
                SessionUpdate::GoOffline => record.online = false,
                SessionUpdate::Location(location) => record.location = Some(location),
            }
            record.updated_at = now;
            let updated = record.clone();
            state.locations.update(captain, updated.location);
            Ok(updated)
        }))
    }

    fn available_captains_near(
        &self,
        point: GeoPoint,
        class: VehicleClass,
        radius_km: f64,
    ) -> BoxFuture<'_, Result<Vec<NearbyCaptain>, StoreError>> {
        Box::pin(async move {
            self.read(|state| {
                let nearby = state
                    .locations
                    .candidates(point, radius_km)
                    .into_iter()
                    .filter_map(|id| state.captains.get(&id))
                    .filter(|captain| captain.is_available_for(class))
                    .filter_map(|captain| {
                        let distance_km = captain.location?.distance_km(&point);
                        (distance_km <= radius_km).then(|| NearbyCaptain {
                            captain: captain.clone(),
                            distance_km,
                        })
                    })
                    .collect();
                Ok(nearby)
            })
        })
    }

    fn refresh_captain_rating(&self, id: CaptainId) -> BoxFuture<'_, Result<f64, StoreError>> {
        Box::pin(self.write(move |state| {
            let mean = MemoryStore::ratings_mean(state, Actor::Captain(id));
            let captain = state
                .captains
                .get_mut(&id)
                .ok_or(StoreError::CaptainNotFound(id))?;
            if let Some(mean) = mean {
                captain.rating = mean;
            }
            Ok(captain.rating)
        }))
    }

    fn refresh_rider_rating(&self, id: RiderId) -> BoxFuture<'_, Result<f64, StoreError>> {
        Box::pin(self.write(move |state| {
            let mean = MemoryStore::ratings_mean(state, Actor::Rider(id));
            let rider = state
                .riders
                .get_mut(&id)
                .ok_or(StoreError::RiderNotFound(id))?;
            if let Some(mean) = mean {
                rider.rating = mean;
            }
            Ok(rider.rating)
        }))
    }

    fn put_deadline(&self, deadline: Deadline) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.write(move |state| {
            state
                .deadlines
                .insert((deadline.ride, deadline.kind), deadline);
            Ok(())
        }))
    }

    fn remove_deadline(&self, deadline: Deadline) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.write(move |state| {
            let key = (deadline.ride, deadline.kind);
            if state.deadlines.get(&key) == Some(&deadline) {
                state.deadlines.remove(&key);
            }
            Ok(())
        }))
    }

    fn clear_deadlines(&self, ride: RideId) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.write(move |state| {
            state.deadlines.retain(|(id, _), _| *id != ride);
            Ok(())
        }))
    }

    fn deadlines(&self) -> BoxFuture<'_, Result<Vec<Deadline>, StoreError>> {
        Box::pin(async move { self.read(|state| Ok(state.sorted_deadlines())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Rider;
    use crate::ride::test_support::{
        CAPTAIN, OTHER_CAPTAIN, RIDER, online_captain, pickup, sample_draft, t0,
    };
    use crate::ride::{Rating, Ride};
    use chrono::Duration;
    use tempfile::tempdir;

    async fn seeded(store: &MemoryStore) -> Ride {
        let at = pickup().point;
        store
            .upsert_captain(online_captain(CAPTAIN.0, VehicleClass::Mini, at))
            .await
            .unwrap();
        store
            .upsert_captain(online_captain(OTHER_CAPTAIN.0, VehicleClass::Mini, at))
            .await
            .unwrap();
        store.upsert_rider(Rider::new(RIDER, "Ravi")).await.unwrap();
        store
            .insert_ride(Ride::from_draft(sample_draft(), t0()))
            .await
            .unwrap()
    }

    fn claim(captain: CaptainId) -> CaptainEffect {
        CaptainEffect::Claim {
            captain,
            class: VehicleClass::Mini,
        }
    }

    #[tokio::test]
    async fn insert_assigns_identity() {
        let store = MemoryStore::new();
        let ride = seeded(&store).await;
        assert_eq!(ride.id, RideId(1));
        assert_eq!(ride.version, 1);
        assert_eq!(store.ride(ride.id).await.unwrap(), ride);
        assert_eq!(store.searching_rides().await.unwrap(), vec![ride]);
    }

    #[tokio::test]
    async fn rider_cannot_hold_two_active_rides() {
        let store = MemoryStore::new();
        seeded(&store).await;
        let err = store
            .insert_ride(Ride::from_draft(sample_draft(), t0()))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::RiderBusy(RIDER));
    }

    #[tokio::test]
    async fn stale_commit_is_rejected() {
        let store = MemoryStore::new();
        let ride = seeded(&store).await;

        let mut first = ride.clone();
        first.accept(CAPTAIN, t0()).unwrap();
        store
            .commit(RideCommit::new(first).with_effect(claim(CAPTAIN)))
            .await
            .unwrap();

        let mut second = ride;
        second.accept(OTHER_CAPTAIN, t0()).unwrap();
        let err = store
            .commit(RideCommit::new(second).with_effect(claim(OTHER_CAPTAIN)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { actual: 2, .. }));

        // The loser's flag is untouched.
        assert!(!store.captain(OTHER_CAPTAIN).await.unwrap().on_ride);
        assert!(store.captain(CAPTAIN).await.unwrap().on_ride);
    }

    #[tokio::test]
    async fn claim_checks_availability_atomically() {
        let store = MemoryStore::new();
        let ride = seeded(&store).await;
        store
            .update_session(CAPTAIN, SessionUpdate::GoOffline, t0())
            .await
            .unwrap();

        let mut accepted = ride.clone();
        accepted.accept(CAPTAIN, t0()).unwrap();
        let err = store
            .commit(RideCommit::new(accepted).with_effect(claim(CAPTAIN)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::CaptainUnavailable {
                captain: CAPTAIN,
                reason: "offline"
            }
        );
        // Neither half of the commit was applied.
        assert_eq!(store.ride(ride.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn active_indexes_follow_commits() {
        let store = MemoryStore::new();
        let ride = seeded(&store).await;

        let mut accepted = ride.clone();
        accepted.accept(CAPTAIN, t0()).unwrap();
        let accepted = store
            .commit(RideCommit::new(accepted).with_effect(claim(CAPTAIN)))
            .await
            .unwrap();
        let held = store.active_ride(Actor::Captain(CAPTAIN)).await.unwrap();
        assert_eq!(held.map(|r| r.id), Some(ride.id));
        assert!(store.searching_rides().await.unwrap().is_empty());

        let mut cancelled = accepted;
        cancelled
            .cancel(
                &Actor::Rider(RIDER),
                "",
                &Default::default(),
                t0() + Duration::seconds(10),
            )
            .unwrap();
        store
            .commit(RideCommit::new(cancelled).with_effect(CaptainEffect::Release {
                captain: CAPTAIN,
                penalize: false,
            }))
            .await
            .unwrap();

        assert!(store.active_ride(Actor::Captain(CAPTAIN)).await.unwrap().is_none());
        assert!(store.active_ride(Actor::Rider(RIDER)).await.unwrap().is_none());
        assert!(!store.captain(CAPTAIN).await.unwrap().on_ride);
    }

    #[tokio::test]
    async fn reregistration_keeps_session_state() {
        let store = MemoryStore::new();
        let ride = seeded(&store).await;
        let mut accepted = ride.clone();
        accepted.accept(CAPTAIN, t0()).unwrap();
        store
            .commit(RideCommit::new(accepted).with_effect(claim(CAPTAIN)))
            .await
            .unwrap();
        let before = store.captain(CAPTAIN).await.unwrap();

        store
            .upsert_captain(Captain::new(
                CAPTAIN,
                "Ravi K",
                VehicleClass::Mini,
                ApprovalStatus::Rejected,
                t0() + Duration::hours(1),
            ))
            .await
            .unwrap();

        let after = store.captain(CAPTAIN).await.unwrap();
        assert_eq!(after.name, "Ravi K");
        assert_eq!(after.approval, ApprovalStatus::Rejected);
        assert!(after.online);
        assert!(after.on_ride);
        assert_eq!(after.location, Some(pickup().point));
        assert_eq!(after.rating, before.rating);
        assert_eq!(after.recent_accepts, 1);
        assert_eq!(after.recent_cancellations, before.recent_cancellations);
        assert_eq!(after.updated_at, before.updated_at);
        // Busy and now rejected, so never offered.
        let nearby = store
            .available_captains_near(pickup().point, VehicleClass::Mini, 5.0)
            .await
            .unwrap();
        assert!(nearby.iter().all(|n| n.captain.id != CAPTAIN));
        let held = store.active_ride(Actor::Captain(CAPTAIN)).await.unwrap();
        assert_eq!(held.map(|r| r.id), Some(ride.id));
    }

    #[tokio::test]
    async fn tracking_only_inside_window() {
        let store = MemoryStore::new();
        let ride = seeded(&store).await;
        let sample = TrackingSample {
            point: pickup().point,
            at: t0(),
        };

        let err = store
            .append_tracking(ride.id, CAPTAIN, sample.clone())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotTracking(ride.id));

        let mut accepted = ride.clone();
        accepted.accept(CAPTAIN, t0()).unwrap();
        store
            .commit(RideCommit::new(accepted).with_effect(claim(CAPTAIN)))
            .await
            .unwrap();
        store
            .append_tracking(ride.id, CAPTAIN, sample.clone())
            .await
            .unwrap();
        assert!(
            store
                .append_tracking(ride.id, OTHER_CAPTAIN, sample)
                .await
                .is_err()
        );
        assert_eq!(store.tracking(ride.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nearby_filters_availability_and_distance() {
        let store = MemoryStore::new();
        let at = pickup().point;
        store
            .upsert_captain(online_captain(1, VehicleClass::Mini, at))
            .await
            .unwrap();
        store
            .upsert_captain(online_captain(2, VehicleClass::Bike, at))
            .await
            .unwrap();
        let far = GeoPoint::new(13.2, 77.7).unwrap();
        store
            .upsert_captain(online_captain(3, VehicleClass::Mini, far))
            .await
            .unwrap();
        let mut pending = online_captain(4, VehicleClass::Mini, at);
        pending.approval = ApprovalStatus::Pending;
        store.upsert_captain(pending).await.unwrap();

        let nearby = store
            .available_captains_near(at, VehicleClass::Mini, 5.0)
            .await
            .unwrap();
        let ids: Vec<CaptainId> = nearby.iter().map(|n| n.captain.id).collect();
        assert_eq!(ids, vec![CaptainId(1)]);
    }

    #[tokio::test]
    async fn ratings_are_recomputed_by_rescan() {
        let store = MemoryStore::new();
        let ride = seeded(&store).await;

        let mut done = ride;
        done.captain = Some(CAPTAIN);
        done.status = RideStatus::Completed;
        done.ratings.by_rider = Some(Rating {
            stars: 4,
            comment: String::new(),
            at: t0(),
        });
        store.commit(RideCommit::new(done)).await.unwrap();

        assert_eq!(store.refresh_captain_rating(CAPTAIN).await.unwrap(), 4.0);
        // No ratings received: the default stands.
        assert_eq!(store.refresh_rider_rating(RIDER).await.unwrap(), 5.0);
    }

    #[tokio::test]
    async fn rearmed_deadline_survives_stale_removal() {
        let store = MemoryStore::new();
        let first = Deadline {
            ride: RideId(1),
            kind: DeadlineKind::Expire,
            due_at: t0(),
        };
        let rearmed = Deadline {
            due_at: t0() + Duration::seconds(90),
            ..first
        };
        store.put_deadline(first).await.unwrap();
        store.put_deadline(rearmed).await.unwrap();

        store.remove_deadline(first).await.unwrap();
        assert_eq!(store.deadlines().await.unwrap(), vec![rearmed]);

        store.clear_deadlines(RideId(1)).await.unwrap();
        assert!(store.deadlines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rides.json");

        let ride = {
            let store = MemoryStore::open(SnapshotFile::new(&path)).unwrap();
            let ride = seeded(&store).await;
            store
                .put_deadline(Deadline {
                    ride: ride.id,
                    kind: DeadlineKind::Expire,
                    due_at: t0() + Duration::seconds(60),
                })
                .await
                .unwrap();
            ride
        };

        let reopened = MemoryStore::open(SnapshotFile::new(&path)).unwrap();
        assert_eq!(reopened.ride(ride.id).await.unwrap(), ride);
        assert_eq!(reopened.deadlines().await.unwrap().len(), 1);
        assert_eq!(
            reopened
                .active_ride(Actor::Rider(RIDER))
                .await
                .unwrap()
                .map(|r| r.id),
            Some(ride.id)
        );
        assert_eq!(
            reopened
                .available_captains_near(pickup().point, VehicleClass::Mini, 1.0)
                .await
                .unwrap()
                .len(),
            2
        );

        // Ids keep counting from where the last process stopped.
        let mut draft = sample_draft();
        draft.rider = RiderId(2);
        let next = reopened.insert_ride(Ride::from_draft(draft, t0())).await.unwrap();
        assert_eq!(next.id, RideId(2));
    }
}
