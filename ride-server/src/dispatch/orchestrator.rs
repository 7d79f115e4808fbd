//! The dispatcher: drives rides through their lifecycle.
//!
//! Every write has the same shape. Read the ride, apply a pure ledger
//! transition to the copy, then commit it against the version that was
//! read. The commit is the only gate. Notifications, offer revocations and
//! wallet postings follow a successful commit and never undo it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coupons::Coupons;
use crate::directions::{Directions, Route, route_or_heuristic};
use crate::domain::{
    Actor, ApprovalStatus, Captain, CaptainId, GeoPoint, OneTimeCode, PaymentMethod, Place,
    RideCode, RideId, Rider, RiderId, VehicleClass,
};
use crate::locator::{CaptainLocator, LocatorConfig, straight_line_eta};
use crate::pricing::{
    FareAdjustments, FareBreakdown, FareModel, PricingConfig, SurgeConfig, SurgeEstimator,
};
use crate::realtime::{CaptainSummary, EventSink, RideEvent, Room};
use crate::retry::with_backoff;
use crate::ride::{
    AppliedCoupon, CancelOutcome, CancellationPolicy, LedgerError, RatedParty, Ride, RideDraft,
    RideStatus, TrackingSample,
};
use crate::store::{
    CaptainEffect, Deadline, DeadlineKind, RideCommit, RideStore, SessionUpdate, StoreError,
};
use crate::wallet::{Account, Posting, Wallet, WalletError};

use super::clock::Clock;
use super::config::DispatchConfig;
use super::error::DispatchError;
use super::fanout;

/// Tunables for every component the dispatcher drives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub dispatch: DispatchConfig,
    pub pricing: PricingConfig,
    pub surge: SurgeConfig,
    pub locator: LocatorConfig,
}

/// The external collaborators the dispatcher talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RideStore>,
    pub directions: Arc<dyn Directions>,
    pub events: Arc<dyn EventSink>,
    pub wallet: Arc<dyn Wallet>,
    pub coupons: Arc<dyn Coupons>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimateRequest {
    pub pickup: GeoPoint,
    pub destination: GeoPoint,
    pub vehicle_class: VehicleClass,
}

/// A priced quote. Nothing is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    pub vehicle_class: VehicleClass,
    pub fare: FareBreakdown,
    pub route: Route,
    pub surge_multiplier: f64,
    /// Captains available within the first search radius.
    pub nearby_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub pickup: Place,
    pub destination: Place,
    pub vehicle_class: VehicleClass,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
    /// Start matching at this time instead of now.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Orchestrates booking, matching and every later transition.
pub struct Dispatcher {
    config: DispatchConfig,
    policy: CancellationPolicy,
    fares: FareModel,
    surge: SurgeEstimator,
    locator: CaptainLocator,
    store: Arc<dyn RideStore>,
    directions: Arc<dyn Directions>,
    events: Arc<dyn EventSink>,
    wallet: Arc<dyn Wallet>,
    coupons: Arc<dyn Coupons>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings, deps: Collaborators) -> Self {
        Self {
            policy: settings.dispatch.cancellation_policy(),
            config: settings.dispatch,
            fares: FareModel::new(settings.pricing),
            surge: SurgeEstimator::new(settings.surge, deps.store.clone()),
            locator: CaptainLocator::new(
                settings.locator,
                deps.store.clone(),
                deps.directions.clone(),
            ),
            store: deps.store,
            directions: deps.directions,
            events: deps.events,
            wallet: deps.wallet,
            coupons: deps.coupons,
            clock: deps.clock,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RideStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read the ride, apply `apply` to a copy and commit it conditionally.
    ///
    /// On a version mismatch the ride is re-read and `apply` re-evaluated
    /// against the fresh state, so the guard decides the outcome.
    async fn transition<T, F>(&self, id: RideId, mut apply: F) -> Result<(Ride, T), DispatchError>
    where
        F: FnMut(&mut Ride) -> Result<(T, Option<CaptainEffect>), LedgerError>,
    {
        let attempts = self.config.commit_attempts.max(1);
        for attempt in 1..=attempts {
            let mut ride = self.store.ride(id).await?;
            let (outcome, effect) = apply(&mut ride)?;

            let mut commit = RideCommit::new(ride);
            if let Some(effect) = effect {
                commit = commit.with_effect(effect);
            }
            match self.store.commit(commit).await {
                Ok(saved) => return Ok((saved, outcome)),
                Err(StoreError::VersionMismatch {
                    expected, actual, ..
                }) => {
                    tracing::debug!(ride = %id, attempt, expected, actual, "Commit raced, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DispatchError::Conflict(format!(
            "ride {id} is changing too quickly, try again"
        )))
    }

    // ========== Pricing and booking ==========

    pub async fn estimate(&self, request: EstimateRequest) -> Result<Estimate, DispatchError> {
        let now = self.clock.now();
        let class = request.vehicle_class;
        let route =
            route_or_heuristic(self.directions.as_ref(), request.pickup, request.destination).await;
        let surge = self.surge.estimate(request.pickup, class, now).await?;
        let fare = self.fares.fare(
            class,
            route.distance_km,
            route.duration_min,
            surge.multiplier,
            0.0,
        )?;
        let nearby_count = self.locator.nearby_count(request.pickup, class).await?;

        Ok(Estimate {
            vehicle_class: class,
            fare,
            route,
            surge_multiplier: surge.multiplier,
            nearby_count,
        })
    }

    /// Create a searching ride for `rider` and start matching it.
    ///
    /// A scheduled ride is stored now and matched when its time comes.
    pub async fn book(&self, rider: RiderId, request: BookingRequest) -> Result<Ride, DispatchError> {
        let now = self.clock.now();
        self.store.rider(rider).await?;
        let scheduled_at = self.check_schedule(request.scheduled_at, now)?;
        if request.pickup.point == request.destination.point {
            return Err(DispatchError::ValidationFailed(
                "pickup and destination are the same".into(),
            ));
        }
        if self.store.active_ride(Actor::Rider(rider)).await?.is_some() {
            return Err(StoreError::RiderBusy(rider).into());
        }

        let class = request.vehicle_class;
        let route = route_or_heuristic(
            self.directions.as_ref(),
            request.pickup.point,
            request.destination.point,
        )
        .await;
        let surge = self.surge.estimate(request.pickup.point, class, now).await?;
        let mut fare = self.fares.fare(
            class,
            route.distance_km,
            route.duration_min,
            surge.multiplier,
            0.0,
        )?;

        let code = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());
        let coupon = match code {
            Some(code) => {
                let grant = self.coupons.redeem(rider, code.to_string(), fare.total).await?;
                fare = self.fares.fare(
                    class,
                    route.distance_km,
                    route.duration_min,
                    surge.multiplier,
                    grant.discount,
                )?;
                Some(AppliedCoupon {
                    code: grant.code,
                    discount: fare.discount,
                })
            }
            None => None,
        };

        let (ride_code, otp) = {
            let mut rng = rand::thread_rng();
            (RideCode::generate(&mut rng), OneTimeCode::generate(&mut rng))
        };
        let draft = RideDraft {
            code: ride_code,
            rider,
            vehicle_class: class,
            pickup: request.pickup,
            destination: request.destination,
            route,
            fare,
            payment_method: request.payment_method,
            otp,
            coupon: coupon.clone(),
            surge_multiplier: surge.multiplier,
            scheduled_at,
        };

        let ride = match self.store.insert_ride(Ride::from_draft(draft, now)).await {
            Ok(ride) => ride,
            Err(e) => {
                if let Some(coupon) = coupon {
                    self.release_coupon(rider, coupon.code).await;
                }
                return Err(e.into());
            }
        };
        tracing::info!(
            ride = %ride.id,
            code = %ride.code,
            %rider,
            %class,
            fare = ride.fare.total,
            surge = ride.surge_multiplier,
            scheduled = ride.scheduled_at.is_some(),
            "Ride booked"
        );

        if let Some(at) = ride.scheduled_at {
            self.store
                .put_deadline(Deadline {
                    ride: ride.id,
                    kind: DeadlineKind::Dispatch,
                    due_at: at,
                })
                .await?;
            return Ok(ride);
        }
        self.begin_matching(ride).await
    }

    /// A schedule time in the future, or `None` to match now.
    fn check_schedule(
        &self,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, DispatchError> {
        let horizon = now
            .checked_add_signed(self.config.max_schedule_ahead())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        match scheduled_at {
            Some(at) if at > horizon => {
                Err(DispatchError::ValidationFailed(format!(
                    "rides can be scheduled at most {} hours ahead",
                    self.config.max_schedule_ahead_hours
                )))
            }
            Some(at) if at > now => Ok(Some(at)),
            _ => Ok(None),
        }
    }

    // ========== Matching ==========

    /// Arm the expiry deadline for the current matching episode and send
    /// offers. Captains who already backed out of this ride are skipped.
    async fn begin_matching(&self, ride: Ride) -> Result<Ride, DispatchError> {
        self.store
            .put_deadline(Deadline {
                ride: ride.id,
                kind: DeadlineKind::Expire,
                due_at: ride.searching_since + self.config.match_timeout(),
            })
            .await?;
        let exclude: Vec<CaptainId> = ride.requeues.iter().map(|r| r.captain).collect();
        self.offer(ride, &exclude).await
    }

    async fn offer(&self, ride: Ride, exclude: &[CaptainId]) -> Result<Ride, DispatchError> {
        let id = ride.id;
        let candidates = self
            .locator
            .find(ride.pickup.point, ride.vehicle_class, exclude)
            .await?;
        if candidates.is_empty() {
            tracing::info!(ride = %id, class = %ride.vehicle_class, "No captains nearby, waiting out the deadline");
            return Ok(ride);
        }

        let pool: Vec<CaptainId> = candidates.iter().map(|c| c.captain.id).collect();
        let recorded = self
            .transition(id, |ride| {
                if ride.status != RideStatus::Searching {
                    return Err(LedgerError::NoLongerAvailable);
                }
                ride.offered_to = pool.clone();
                Ok(((), None))
            })
            .await;
        let ride = match recorded {
            Ok((ride, ())) => ride,
            Err(DispatchError::Conflict(_)) => {
                tracing::debug!(ride = %id, "Ride left searching before offers went out");
                return Ok(self.store.ride(id).await?);
            }
            Err(e) => return Err(e),
        };

        let expires_at = ride.searching_since + self.config.match_timeout();
        fanout::broadcast(self.events.as_ref(), &ride, &candidates, expires_at);
        Ok(ride)
    }

    /// Start matching a scheduled ride whose time has come.
    ///
    /// Returns `None` if the ride is no longer waiting to be matched.
    pub async fn dispatch_scheduled(&self, id: RideId) -> Result<Option<Ride>, DispatchError> {
        let now = self.clock.now();
        let ride = self.store.ride(id).await?;
        if ride.status != RideStatus::Searching || ride.is_scheduled_after(now) {
            return Ok(None);
        }
        tracing::info!(ride = %id, "Scheduled ride due, matching");
        self.begin_matching(ride).await.map(Some)
    }

    /// Cancel a ride nobody accepted in time.
    ///
    /// Returns `None` when there is nothing to do: the ride was accepted,
    /// cancelled, or requeued into a newer matching episode.
    pub async fn expire(&self, id: RideId) -> Result<Option<Ride>, DispatchError> {
        let now = self.clock.now();
        let timeout = self.config.match_timeout();
        let result = self
            .transition(id, |ride| {
                let pool = ride.offered_to.clone();
                ride.expire(timeout, now)?;
                Ok((pool, None))
            })
            .await;
        let (ride, pool) = match result {
            Ok(expired) => expired,
            Err(DispatchError::InvalidState(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        tracing::info!(ride = %id, rider = %ride.rider, "No captain accepted in time, ride cancelled");
        if let Some(coupon) = &ride.coupon {
            self.release_coupon(ride.rider, coupon.code.clone()).await;
        }
        self.events
            .emit(Room::Rider(ride.rider), &cancelled_event(&ride, false));
        fanout::revoke(self.events.as_ref(), id, &pool, None);
        Ok(Some(ride))
    }

    // ========== Captain-driven transitions ==========

    /// Claim a searching ride. Exactly one concurrent caller succeeds; the
    /// rest get [`DispatchError::Conflict`].
    pub async fn accept(&self, captain: CaptainId, id: RideId) -> Result<Ride, DispatchError> {
        let profile = self.store.captain(captain).await?;
        let now = self.clock.now();
        let result = self
            .transition(id, |ride| {
                let pool = ride.offered_to.clone();
                ride.accept(captain, now)?;
                let claim = CaptainEffect::Claim {
                    captain,
                    class: ride.vehicle_class,
                };
                Ok((pool, Some(claim)))
            })
            .await;
        let (ride, pool) = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(ride = %id, %captain, error = %e, "Accept refused");
                return Err(e);
            }
        };
        tracing::info!(ride = %id, %captain, "Ride accepted");

        if let Err(e) = self.store.clear_deadlines(id).await {
            tracing::warn!(ride = %id, error = %e, "Failed to clear matching deadline");
        }
        fanout::revoke(self.events.as_ref(), id, &pool, Some(captain));

        let eta_min = profile.location.map_or(0.0, |at| {
            straight_line_eta(
                at.distance_km(&ride.pickup.point),
                self.locator.config().average_speed_kmh,
            )
        });
        self.events.emit(
            Room::Rider(ride.rider),
            &RideEvent::Accepted {
                ride_id: id,
                captain: summary(&profile),
                eta_min,
            },
        );
        Ok(ride)
    }

    pub async fn set_arriving(&self, captain: CaptainId, id: RideId) -> Result<Ride, DispatchError> {
        let now = self.clock.now();
        let (ride, ()) = self
            .transition(id, |ride| {
                ride.set_arriving(captain, now)?;
                Ok(((), None))
            })
            .await?;
        tracing::info!(ride = %id, %captain, "Captain on the way");

        let location = match self.store.captain(captain).await {
            Ok(profile) => profile.location,
            Err(e) => {
                tracing::warn!(%captain, error = %e, "Could not read captain location");
                None
            }
        };
        let eta_min = match location {
            Some(at) => self.locator.pickup_eta(at, ride.pickup.point).await,
            None => 0.0,
        };
        self.events.emit(
            Room::Rider(ride.rider),
            &RideEvent::CaptainArriving { ride_id: id, eta_min },
        );
        Ok(ride)
    }

    /// Mark the captain at the pickup and reveal the start code to the rider.
    pub async fn arrived(&self, captain: CaptainId, id: RideId) -> Result<Ride, DispatchError> {
        let now = self.clock.now();
        let (ride, ()) = self
            .transition(id, |ride| {
                ride.mark_arrived(captain, now)?;
                Ok(((), None))
            })
            .await?;
        tracing::info!(ride = %id, %captain, "Captain arrived");

        self.events.emit(
            Room::Rider(ride.rider),
            &RideEvent::CaptainArrived {
                ride_id: id,
                otp: ride.otp.value().to_string(),
            },
        );
        Ok(ride)
    }

    pub async fn start(
        &self,
        captain: CaptainId,
        id: RideId,
        code: &str,
    ) -> Result<Ride, DispatchError> {
        let now = self.clock.now();
        let result = self
            .transition(id, |ride| {
                ride.start(captain, code, now)?;
                Ok(((), None))
            })
            .await;
        let (ride, ()) = match result {
            Ok(started) => started,
            Err(e) => {
                tracing::warn!(ride = %id, %captain, error = %e, "Start refused");
                return Err(e);
            }
        };
        tracing::info!(ride = %id, %captain, "Ride started");

        self.events.emit(
            Room::Rider(ride.rider),
            &RideEvent::Started {
                ride_id: id,
                at: ride.timestamps.started_at.unwrap_or(now),
            },
        );
        Ok(ride)
    }

    /// Finish the trip, free the captain and settle the fare.
    pub async fn complete(
        &self,
        captain: CaptainId,
        id: RideId,
        adjustments: FareAdjustments,
    ) -> Result<Ride, DispatchError> {
        adjustments.validate()?;
        let now = self.clock.now();
        let (ride, ()) = self
            .transition(id, |ride| {
                let fare = self.fares.apply_adjustments(&ride.fare, adjustments)?;
                ride.complete(captain, fare, now)?;
                let release = CaptainEffect::Release {
                    captain,
                    penalize: false,
                };
                Ok(((), Some(release)))
            })
            .await?;
        tracing::info!(
            ride = %id,
            %captain,
            total = ride.fare.total,
            earnings = ride.fare.captain_earnings,
            "Ride completed"
        );

        for posting in settlement_postings(&ride) {
            self.post(posting).await;
        }

        let event = RideEvent::Completed {
            ride_id: id,
            fare: ride.fare.clone(),
        };
        self.events.emit(Room::Rider(ride.rider), &event);
        self.events.emit(Room::Captain(captain), &event);
        Ok(ride)
    }

    // ========== Cancellation ==========

    /// Cancel a ride on behalf of `actor`.
    ///
    /// A captain backing out of a ride they accepted sends it back to
    /// searching instead of ending it.
    pub async fn cancel(
        &self,
        actor: Actor,
        id: RideId,
        reason: &str,
    ) -> Result<Ride, DispatchError> {
        let now = self.clock.now();
        let (ride, (outcome, pool)) = self
            .transition(id, |ride| {
                let pool = ride.offered_to.clone();
                let outcome = ride.cancel(&actor, reason, &self.policy, now)?;
                let effect = match outcome {
                    CancelOutcome::Cancelled {
                        released: Some(captain),
                        ..
                    } => Some(CaptainEffect::Release {
                        captain,
                        penalize: false,
                    }),
                    CancelOutcome::Cancelled { released: None, .. } => None,
                    CancelOutcome::Requeued { captain } => Some(CaptainEffect::Release {
                        captain,
                        penalize: true,
                    }),
                };
                Ok(((outcome, pool), effect))
            })
            .await?;

        match outcome {
            CancelOutcome::Cancelled { fee, released } => {
                tracing::info!(ride = %id, by = %actor, fee, "Ride cancelled");
                self.after_cancel(&ride, fee, released, &pool).await;
                Ok(ride)
            }
            CancelOutcome::Requeued { captain } => {
                tracing::info!(ride = %id, %captain, "Captain backed out, ride searching again");
                self.events
                    .emit(Room::Rider(ride.rider), &cancelled_event(&ride, true));
                self.begin_matching(ride).await
            }
        }
    }

    async fn after_cancel(
        &self,
        ride: &Ride,
        fee: f64,
        released: Option<CaptainId>,
        pool: &[CaptainId],
    ) {
        if let Err(e) = self.store.clear_deadlines(ride.id).await {
            tracing::warn!(ride = %ride.id, error = %e, "Failed to clear deadlines");
        }
        if let Some(coupon) = &ride.coupon {
            self.release_coupon(ride.rider, coupon.code.clone()).await;
        }
        if fee > 0.0 {
            self.post(Posting::debit(
                Account::Rider(ride.rider),
                fee,
                ride.id,
                "cancellation-fee",
            ))
            .await;
            if let Some(captain) = released {
                self.post(Posting::credit(
                    Account::Captain(captain),
                    fee,
                    ride.id,
                    "cancellation-fee",
                ))
                .await;
            }
        }

        let event = cancelled_event(ride, false);
        self.events.emit(Room::Rider(ride.rider), &event);
        match released {
            Some(captain) => {
                self.events.emit(Room::Captain(captain), &event);
            }
            None => fanout::revoke(self.events.as_ref(), ride.id, pool, None),
        }
    }

    // ========== After the trip ==========

    /// Record a rating and refresh the rated party's average.
    pub async fn rate(
        &self,
        actor: Actor,
        id: RideId,
        stars: u8,
        comment: &str,
    ) -> Result<Ride, DispatchError> {
        let now = self.clock.now();
        let (ride, party) = self
            .transition(id, |ride| Ok((ride.rate(&actor, stars, comment, now)?, None)))
            .await?;

        let refreshed = match party {
            RatedParty::Captain(captain) => self.store.refresh_captain_rating(captain).await,
            RatedParty::Rider(rider) => self.store.refresh_rider_rating(rider).await,
        };
        match refreshed {
            Ok(rating) => {
                tracing::info!(ride = %id, by = %actor, stars, rating, "Ride rated");
            }
            Err(e) => tracing::warn!(ride = %id, error = %e, "Failed to refresh rating"),
        }
        Ok(ride)
    }

    pub async fn tip(&self, rider: RiderId, id: RideId, amount: f64) -> Result<Ride, DispatchError> {
        let max_tip = self.config.max_tip;
        let (ride, ()) = self
            .transition(id, |ride| {
                ride.add_tip(rider, amount, max_tip)?;
                Ok(((), None))
            })
            .await?;
        tracing::info!(ride = %id, %rider, amount, total = ride.tip_total, "Tip added");

        if let Some(captain) = ride.captain {
            // The committed version tells repeated tips on one ride apart.
            let suffix = ride.version;
            self.post(Posting::debit(Account::Rider(rider), amount, id, "tip").with_key_suffix(suffix))
                .await;
            self.post(
                Posting::credit(Account::Captain(captain), amount, id, "tip").with_key_suffix(suffix),
            )
            .await;
        }
        Ok(ride)
    }

    // ========== Captain sessions ==========

    pub async fn go_online(
        &self,
        captain: CaptainId,
        location: GeoPoint,
    ) -> Result<Captain, DispatchError> {
        let profile = self.store.captain(captain).await?;
        if profile.approval != ApprovalStatus::Approved {
            return Err(DispatchError::Unauthorized(format!(
                "captain {captain} is not approved"
            )));
        }
        let updated = self
            .store
            .update_session(captain, SessionUpdate::GoOnline(location), self.clock.now())
            .await?;
        tracing::info!(%captain, class = %updated.vehicle_class, "Captain online");
        Ok(updated)
    }

    pub async fn go_offline(&self, captain: CaptainId) -> Result<Captain, DispatchError> {
        let updated = self
            .store
            .update_session(captain, SessionUpdate::GoOffline, self.clock.now())
            .await?;
        tracing::info!(%captain, "Captain offline");
        Ok(updated)
    }

    /// Move the captain, and if they are serving a ride, log the sample
    /// and forward it to the rider.
    pub async fn update_location(
        &self,
        captain: CaptainId,
        location: GeoPoint,
    ) -> Result<Captain, DispatchError> {
        let now = self.clock.now();
        let updated = self
            .store
            .update_session(captain, SessionUpdate::Location(location), now)
            .await?;

        let Some(ride) = self.store.active_ride(Actor::Captain(captain)).await? else {
            return Ok(updated);
        };
        if !ride.status.accepts_tracking() {
            return Ok(updated);
        }
        let sample = TrackingSample {
            point: location,
            at: now,
        };
        match self.store.append_tracking(ride.id, captain, sample).await {
            Ok(()) => {
                self.events.emit(
                    Room::Rider(ride.rider),
                    &RideEvent::CaptainLocation {
                        ride_id: ride.id,
                        location,
                        at: now,
                    },
                );
            }
            Err(StoreError::NotTracking(_)) => {
                tracing::debug!(ride = %ride.id, %captain, "Ride left its tracking window");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(updated)
    }

    // ========== Reads and registration ==========

    pub async fn ride(&self, actor: &Actor, id: RideId) -> Result<Ride, DispatchError> {
        let ride = self.store.ride(id).await?;
        if !ride.visible_to(actor) {
            return Err(DispatchError::Unauthorized(format!(
                "{actor} may not view ride {id}"
            )));
        }
        Ok(ride)
    }

    pub async fn active_ride(&self, actor: &Actor) -> Result<Option<Ride>, DispatchError> {
        Ok(self.store.active_ride(*actor).await?)
    }

    pub async fn tracking(
        &self,
        actor: &Actor,
        id: RideId,
    ) -> Result<Vec<TrackingSample>, DispatchError> {
        self.ride(actor, id).await?;
        Ok(self.store.tracking(id).await?)
    }

    pub async fn recent_rides(&self, limit: usize) -> Result<Vec<Ride>, DispatchError> {
        Ok(self.store.recent_rides(limit).await?)
    }

    pub async fn register_captain(&self, captain: Captain) -> Result<(), DispatchError> {
        tracing::info!(captain = %captain.id, class = %captain.vehicle_class, "Captain registered");
        Ok(self.store.upsert_captain(captain).await?)
    }

    pub async fn register_rider(&self, rider: Rider) -> Result<(), DispatchError> {
        tracing::info!(rider = %rider.id, "Rider registered");
        Ok(self.store.upsert_rider(rider).await?)
    }

    // ========== Collaborator calls that degrade instead of failing the request ==========

    async fn post(&self, posting: Posting) {
        let wallet = &self.wallet;
        let result = with_backoff(
            &self.config.wallet_retry,
            "wallet posting",
            WalletError::is_transient,
            || wallet.post(posting.clone()),
        )
        .await;
        if let Err(e) = result {
            tracing::error!(key = %posting.key, amount = posting.amount, error = %e, "Wallet posting failed");
        }
    }

    async fn release_coupon(&self, rider: RiderId, code: String) {
        if let Err(e) = self.coupons.release(rider, code.clone()).await {
            tracing::warn!(%rider, %code, error = %e, "Failed to release coupon");
        }
    }
}

/// Ledger postings that settle a completed ride.
///
/// Cash fares are collected by the captain, who then owes the platform fee.
/// Every other method moves the fare from rider to captain.
pub(crate) fn settlement_postings(ride: &Ride) -> Vec<Posting> {
    let Some(captain) = ride.captain else {
        return Vec::new();
    };
    match ride.payment.method {
        PaymentMethod::Cash => vec![Posting::debit(
            Account::Captain(captain),
            ride.fare.platform_fee,
            ride.id,
            "commission",
        )],
        PaymentMethod::Wallet | PaymentMethod::Card => vec![
            Posting::debit(Account::Rider(ride.rider), ride.fare.total, ride.id, "fare"),
            Posting::credit(
                Account::Captain(captain),
                ride.fare.captain_earnings,
                ride.id,
                "earnings",
            ),
        ],
    }
}

fn summary(captain: &Captain) -> CaptainSummary {
    CaptainSummary {
        id: captain.id,
        name: captain.name.clone(),
        vehicle_class: captain.vehicle_class,
        rating: captain.rating,
        location: captain.location,
    }
}

/// `ride:cancelled` for the ride's latest cancellation or requeue.
fn cancelled_event(ride: &Ride, requeued: bool) -> RideEvent {
    let (reason, fee, by) = if requeued {
        let reason = ride
            .requeues
            .last()
            .map(|r| r.reason.clone())
            .unwrap_or_default();
        (reason, 0.0, Some("captain"))
    } else {
        match &ride.cancellation {
            Some(c) => (c.reason.clone(), c.fee, c.by.as_ref().map(Actor::role)),
            None => (String::new(), 0.0, None),
        }
    };
    RideEvent::Cancelled {
        ride_id: ride.id,
        reason,
        fee,
        by,
        requeued,
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
