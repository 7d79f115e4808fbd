//! Scenario tests for the dispatcher against the in-memory collaborators.

use super::*;
use crate::coupons::{CouponOffer, CouponRule, MemoryCoupons};
use crate::directions::UnavailableDirections;
use crate::dispatch::{DeadlineSupervisor, ManualClock, RecoveryReport};
use crate::retry::RetryPolicy;
use crate::ride::NO_CAPTAIN_REASON;
use crate::ride::test_support::{
    CAPTAIN, OTHER_CAPTAIN, RIDER, destination, online_captain, pickup, t0,
};
use crate::store::{MemoryStore, SnapshotFile};
use crate::wallet::MemoryWallet;
use chrono::Duration;
use std::sync::Mutex;

/// Records every emitted event.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(Room, RideEvent)>>,
}

impl RecordingSink {
    fn names_for(&self, room: Room) -> Vec<&'static str> {
        self.events_for(room).iter().map(RideEvent::name).collect()
    }

    fn events_for(&self, room: Room) -> Vec<RideEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == room)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, room: Room, event: &RideEvent) -> usize {
        self.events.lock().unwrap().push((room, event.clone()));
        1
    }
}

struct Harness {
    dispatcher: Arc<Dispatcher>,
    store: Arc<MemoryStore>,
    events: Arc<RecordingSink>,
    wallet: Arc<MemoryWallet>,
    clock: Arc<ManualClock>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_store(MemoryStore::new()).await
    }

    async fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let events = Arc::new(RecordingSink::default());
        let wallet = Arc::new(MemoryWallet::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let coupons = Arc::new(MemoryCoupons::new([CouponOffer {
            code: "FLAT50".into(),
            rule: CouponRule::Flat { amount: 50.0 },
            min_fare: 0.0,
        }]));

        let settings = DispatchSettings {
            dispatch: DispatchConfig::default().with_wallet_retry(RetryPolicy::none()),
            ..DispatchSettings::default()
        };
        let dispatcher = Arc::new(Dispatcher::new(
            settings,
            Collaborators {
                store: store.clone(),
                directions: Arc::new(UnavailableDirections),
                events: events.clone(),
                wallet: wallet.clone(),
                coupons,
                clock: clock.clone(),
            },
        ));
        dispatcher
            .register_rider(Rider::new(RIDER, "Asha"))
            .await
            .unwrap();

        Self {
            dispatcher,
            store,
            events,
            wallet,
            clock,
        }
    }

    async fn add_captain(&self, id: u64, class: VehicleClass, km_north: f64) {
        let at = GeoPoint::new(pickup().point.lat() + km_north / 111.195, pickup().point.lng())
            .unwrap();
        self.dispatcher
            .register_captain(online_captain(id, class, at))
            .await
            .unwrap();
    }

    async fn book(&self, class: VehicleClass, method: PaymentMethod) -> Ride {
        self.dispatcher
            .book(RIDER, booking(class, method))
            .await
            .unwrap()
    }

    /// A Mini ride booked and accepted by `CAPTAIN`.
    async fn accepted(&self, method: PaymentMethod) -> Ride {
        self.add_captain(CAPTAIN.0, VehicleClass::Mini, 0.5).await;
        let ride = self.book(VehicleClass::Mini, method).await;
        self.dispatcher.accept(CAPTAIN, ride.id).await.unwrap()
    }

    /// A ride driven all the way to `started`.
    async fn started(&self, method: PaymentMethod) -> Ride {
        let ride = self.accepted(method).await;
        self.dispatcher.set_arriving(CAPTAIN, ride.id).await.unwrap();
        let ride = self.dispatcher.arrived(CAPTAIN, ride.id).await.unwrap();
        let code = ride.otp.value().to_string();
        self.dispatcher.start(CAPTAIN, ride.id, &code).await.unwrap()
    }

    async fn completed(&self, method: PaymentMethod) -> Ride {
        let ride = self.started(method).await;
        self.dispatcher
            .complete(CAPTAIN, ride.id, FareAdjustments::default())
            .await
            .unwrap()
    }

    fn supervisor(&self) -> DeadlineSupervisor {
        DeadlineSupervisor::new(self.dispatcher.clone())
    }
}

fn booking(class: VehicleClass, method: PaymentMethod) -> BookingRequest {
    BookingRequest {
        pickup: pickup(),
        destination: destination(),
        vehicle_class: class,
        payment_method: method,
        coupon_code: None,
        scheduled_at: None,
    }
}

// ========== Booking and matching ==========

#[tokio::test]
async fn booking_offers_to_nearby_captains() {
    let h = Harness::new().await;
    h.add_captain(CAPTAIN.0, VehicleClass::Mini, 0.5).await;
    h.add_captain(OTHER_CAPTAIN.0, VehicleClass::Mini, 1.5).await;
    h.add_captain(12, VehicleClass::Sedan, 0.2).await;

    let ride = h.book(VehicleClass::Mini, PaymentMethod::Cash).await;

    assert_eq!(ride.status, RideStatus::Searching);
    assert_eq!(ride.offered_to, vec![CAPTAIN, OTHER_CAPTAIN]);
    assert_eq!(h.events.names_for(Room::Captain(CAPTAIN)), vec!["ride:new-request"]);
    assert_eq!(
        h.events.names_for(Room::Captain(OTHER_CAPTAIN)),
        vec!["ride:new-request"]
    );
    assert!(h.events.names_for(Room::Captain(CaptainId(12))).is_empty());

    let deadlines = h.store.deadlines().await.unwrap();
    assert_eq!(
        deadlines,
        vec![Deadline {
            ride: ride.id,
            kind: DeadlineKind::Expire,
            due_at: t0() + Duration::seconds(60),
        }]
    );
}

#[tokio::test]
async fn second_active_booking_conflicts() {
    let h = Harness::new().await;
    h.book(VehicleClass::Mini, PaymentMethod::Cash).await;

    let err = h
        .dispatcher
        .book(RIDER, booking(VehicleClass::Auto, PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Conflict(_)));
}

#[tokio::test]
async fn unknown_rider_cannot_book() {
    let h = Harness::new().await;
    let err = h
        .dispatcher
        .book(RiderId(99), booking(VehicleClass::Mini, PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
}

#[tokio::test]
async fn schedule_too_far_ahead_is_rejected() {
    let h = Harness::new().await;
    let mut request = booking(VehicleClass::Mini, PaymentMethod::Cash);
    request.scheduled_at = Some(t0() + Duration::days(8));

    let err = h.dispatcher.book(RIDER, request).await.unwrap_err();
    assert!(matches!(err, DispatchError::ValidationFailed(_)));
}

#[tokio::test]
async fn coupon_discount_applies_and_returns_on_cancel() {
    let h = Harness::new().await;
    let mut request = booking(VehicleClass::Sedan, PaymentMethod::Wallet);
    request.coupon_code = Some(" flat50 ".into());

    let ride = h.dispatcher.book(RIDER, request.clone()).await.unwrap();
    assert_eq!(ride.fare.discount, 50.0);
    assert_eq!(ride.coupon.as_ref().map(|c| c.code.as_str()), Some("FLAT50"));

    h.dispatcher
        .cancel(Actor::Rider(RIDER), ride.id, "changed plans")
        .await
        .unwrap();

    // Released on cancel, so the same rider can use it again.
    let again = h.dispatcher.book(RIDER, request).await.unwrap();
    assert_eq!(again.fare.discount, 50.0);
}

#[tokio::test]
async fn estimate_counts_nearby_captains() {
    let h = Harness::new().await;
    h.add_captain(CAPTAIN.0, VehicleClass::Auto, 1.0).await;
    h.add_captain(OTHER_CAPTAIN.0, VehicleClass::Auto, 12.0).await;

    let estimate = h
        .dispatcher
        .estimate(EstimateRequest {
            pickup: pickup().point,
            destination: destination().point,
            vehicle_class: VehicleClass::Auto,
        })
        .await
        .unwrap();

    assert_eq!(estimate.nearby_count, 1);
    assert!(estimate.fare.total > 0.0);
    assert!((1.0..=3.0).contains(&estimate.surge_multiplier));
    // Nothing was persisted.
    assert!(h.store.recent_rides(10).await.unwrap().is_empty());
}

// ========== Acceptance ==========

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_accepts_have_one_winner() {
    let h = Harness::new().await;
    let ids: Vec<u64> = (20..28).collect();
    for (i, id) in ids.iter().enumerate() {
        h.add_captain(*id, VehicleClass::Mini, 0.2 + i as f64 * 0.1).await;
    }
    let ride = h.book(VehicleClass::Mini, PaymentMethod::Cash).await;

    let attempts = ids.iter().map(|id| {
        let dispatcher = h.dispatcher.clone();
        let captain = CaptainId(*id);
        tokio::spawn(async move { (captain, dispatcher.accept(captain, ride.id).await) })
    });
    let results: Vec<(CaptainId, Result<Ride, DispatchError>)> =
        futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

    let winners: Vec<CaptainId> = results
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(c, _)| *c)
        .collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0];
    for (captain, result) in &results {
        if *captain != winner {
            assert!(matches!(result, Err(DispatchError::Conflict(_))), "{captain}: {result:?}");
        }
    }

    let stored = h.store.ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::Accepted);
    assert_eq!(stored.captain, Some(winner));
    for id in &ids {
        let captain = h.store.captain(CaptainId(*id)).await.unwrap();
        assert_eq!(captain.on_ride, captain.id == winner);
    }
    assert!(h.store.deadlines().await.unwrap().is_empty());
    assert_eq!(h.events.names_for(Room::Rider(RIDER)), vec!["ride:accepted"]);
}

#[tokio::test]
async fn losing_captains_get_revocations() {
    let h = Harness::new().await;
    h.add_captain(CAPTAIN.0, VehicleClass::Mini, 0.5).await;
    h.add_captain(OTHER_CAPTAIN.0, VehicleClass::Mini, 1.0).await;
    let ride = h.book(VehicleClass::Mini, PaymentMethod::Cash).await;

    h.dispatcher.accept(CAPTAIN, ride.id).await.unwrap();

    assert_eq!(h.events.names_for(Room::Captain(CAPTAIN)), vec!["ride:new-request"]);
    assert_eq!(
        h.events.names_for(Room::Captain(OTHER_CAPTAIN)),
        vec!["ride:new-request", "ride:taken"]
    );
    let err = h.dispatcher.accept(OTHER_CAPTAIN, ride.id).await.unwrap_err();
    assert_eq!(err, DispatchError::Conflict("ride no longer available".into()));
}

#[tokio::test]
async fn offline_captain_cannot_accept() {
    let h = Harness::new().await;
    h.add_captain(CAPTAIN.0, VehicleClass::Mini, 0.5).await;
    let ride = h.book(VehicleClass::Mini, PaymentMethod::Cash).await;
    h.dispatcher.go_offline(CAPTAIN).await.unwrap();

    let err = h.dispatcher.accept(CAPTAIN, ride.id).await.unwrap_err();
    assert!(matches!(err, DispatchError::Conflict(_)));
    let stored = h.store.ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::Searching);
    assert_eq!(stored.captain, None);
}

// ========== Trip ==========

#[tokio::test]
async fn wrong_code_leaves_ride_arrived() {
    let h = Harness::new().await;
    let ride = h.accepted(PaymentMethod::Cash).await;
    let arrived = h.dispatcher.arrived(CAPTAIN, ride.id).await.unwrap();
    let wrong = if arrived.otp.value() == "0000" { "1111" } else { "0000" };

    let err = h.dispatcher.start(CAPTAIN, ride.id, wrong).await.unwrap_err();

    assert_eq!(err, DispatchError::ValidationFailed("invalid code".into()));
    let stored = h.store.ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::Arrived);
    assert_eq!(stored.timestamps, arrived.timestamps);
    assert!(!stored.otp.is_verified());
}

#[tokio::test]
async fn arrival_reveals_code_to_rider_only() {
    let h = Harness::new().await;
    let ride = h.accepted(PaymentMethod::Cash).await;
    let arrived = h.dispatcher.arrived(CAPTAIN, ride.id).await.unwrap();

    let rider_events = h.events.events_for(Room::Rider(RIDER));
    assert!(rider_events.contains(&RideEvent::CaptainArrived {
        ride_id: ride.id,
        otp: arrived.otp.value().to_string(),
    }));
    assert!(
        !h.events
            .names_for(Room::Captain(CAPTAIN))
            .contains(&"ride:captain-arrived")
    );
}

#[tokio::test]
async fn completion_settles_card_fare() {
    let h = Harness::new().await;
    let ride = h.started(PaymentMethod::Card).await;

    let done = h
        .dispatcher
        .complete(
            CAPTAIN,
            ride.id,
            FareAdjustments {
                toll: 25.0,
                waiting_minutes: 0.0,
            },
        )
        .await
        .unwrap();

    assert_eq!(done.status, RideStatus::Completed);
    assert_eq!(done.fare.toll, 25.0);
    assert_eq!(done.fare.total, round2(ride.fare.total + 25.0));
    assert_eq!(h.wallet.balance(Account::Rider(RIDER)), -done.fare.total);
    assert_eq!(
        h.wallet.balance(Account::Captain(CAPTAIN)),
        done.fare.captain_earnings
    );
    assert!(!h.store.captain(CAPTAIN).await.unwrap().on_ride);
    assert!(h.dispatcher.active_ride(&Actor::Rider(RIDER)).await.unwrap().is_none());
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[test]
fn cash_rides_charge_the_captain_commission() {
    let mut ride = crate::ride::test_support::sample_ride();
    ride.captain = Some(CAPTAIN);

    let postings = settlement_postings(&ride);
    assert_eq!(postings.len(), 1);
    assert_eq!(postings[0].account, Account::Captain(CAPTAIN));
    assert_eq!(postings[0].amount, -ride.fare.platform_fee);

    ride.payment.method = PaymentMethod::Wallet;
    let postings = settlement_postings(&ride);
    let accounts: Vec<Account> = postings.iter().map(|p| p.account).collect();
    assert_eq!(
        accounts,
        vec![Account::Rider(RIDER), Account::Captain(CAPTAIN)]
    );
}

#[tokio::test]
async fn location_updates_are_tracked_and_forwarded() {
    let h = Harness::new().await;
    let ride = h.accepted(PaymentMethod::Cash).await;
    let here = GeoPoint::new(12.9740, 77.6052).unwrap();

    h.dispatcher.update_location(CAPTAIN, here).await.unwrap();

    let samples = h
        .dispatcher
        .tracking(&Actor::Rider(RIDER), ride.id)
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].point, here);
    assert!(
        h.events
            .names_for(Room::Rider(RIDER))
            .contains(&"captain:location")
    );
}

#[tokio::test]
async fn strangers_cannot_read_a_ride() {
    let h = Harness::new().await;
    let ride = h.book(VehicleClass::Mini, PaymentMethod::Cash).await;

    let err = h
        .dispatcher
        .ride(&Actor::Rider(RiderId(2)), ride.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Unauthorized(_)));
    assert!(h.dispatcher.ride(&Actor::Rider(RIDER), ride.id).await.is_ok());
}

// ========== Cancellation ==========

#[tokio::test]
async fn late_rider_cancel_pays_the_captain() {
    let h = Harness::new().await;
    let ride = h.accepted(PaymentMethod::Wallet).await;
    h.clock.advance(Duration::minutes(3));

    let cancelled = h
        .dispatcher
        .cancel(Actor::Rider(RIDER), ride.id, "took too long")
        .await
        .unwrap();

    assert_eq!(cancelled.status, RideStatus::Cancelled);
    assert_eq!(cancelled.cancellation.as_ref().unwrap().fee, 20.0);
    assert_eq!(h.wallet.balance(Account::Rider(RIDER)), -20.0);
    assert_eq!(h.wallet.balance(Account::Captain(CAPTAIN)), 20.0);
    assert!(!h.store.captain(CAPTAIN).await.unwrap().on_ride);
    assert!(
        h.events
            .names_for(Room::Captain(CAPTAIN))
            .contains(&"ride:cancelled")
    );

    let err = h
        .dispatcher
        .cancel(Actor::Rider(RIDER), ride.id, "again")
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Conflict("ride already cancelled".into()));
    assert_eq!(h.wallet.balance(Account::Rider(RIDER)), -20.0);
}

#[tokio::test]
async fn cancel_within_grace_is_free() {
    let h = Harness::new().await;
    let ride = h.accepted(PaymentMethod::Wallet).await;
    h.clock.advance(Duration::seconds(90));

    let cancelled = h
        .dispatcher
        .cancel(Actor::Rider(RIDER), ride.id, "")
        .await
        .unwrap();

    assert_eq!(cancelled.cancellation.unwrap().fee, 0.0);
    assert!(h.wallet.postings().is_empty());
}

#[tokio::test]
async fn captain_cancel_requeues_to_others() {
    let h = Harness::new().await;
    h.add_captain(OTHER_CAPTAIN.0, VehicleClass::Mini, 2.0).await;
    let ride = h.accepted(PaymentMethod::Cash).await;
    h.clock.advance(Duration::seconds(30));

    let requeued = h
        .dispatcher
        .cancel(Actor::Captain(CAPTAIN), ride.id, "flat tyre")
        .await
        .unwrap();

    assert_eq!(requeued.status, RideStatus::Searching);
    assert_eq!(requeued.captain, None);
    assert_eq!(requeued.offered_to, vec![OTHER_CAPTAIN]);
    assert_eq!(requeued.searching_since, t0() + Duration::seconds(30));

    let backed_out = h.store.captain(CAPTAIN).await.unwrap();
    assert!(!backed_out.on_ride);
    assert_eq!(backed_out.recent_cancellations, 1);

    assert!(h.events.events_for(Room::Rider(RIDER)).contains(&RideEvent::Cancelled {
        ride_id: ride.id,
        reason: "flat tyre".into(),
        fee: 0.0,
        by: Some("captain"),
        requeued: true,
    }));
    assert_eq!(
        h.store.deadlines().await.unwrap(),
        vec![Deadline {
            ride: ride.id,
            kind: DeadlineKind::Expire,
            due_at: t0() + Duration::seconds(90),
        }]
    );
}

// ========== Deadlines ==========

#[tokio::test]
async fn bike_with_no_captains_expires() {
    let h = Harness::new().await;
    let ride = h.book(VehicleClass::Bike, PaymentMethod::Cash).await;
    let supervisor = h.supervisor();

    h.clock.advance(Duration::seconds(30));
    assert_eq!(supervisor.tick().await.unwrap(), 0);
    assert_eq!(
        h.store.ride(ride.id).await.unwrap().status,
        RideStatus::Searching
    );

    h.clock.advance(Duration::seconds(30));
    assert_eq!(supervisor.tick().await.unwrap(), 1);

    let expired = h.store.ride(ride.id).await.unwrap();
    assert_eq!(expired.status, RideStatus::Cancelled);
    let cancellation = expired.cancellation.unwrap();
    assert_eq!(cancellation.reason, NO_CAPTAIN_REASON);
    assert_eq!(cancellation.by, None);
    assert_eq!(h.events.names_for(Room::Rider(RIDER)), vec!["ride:cancelled"]);
    assert!(h.store.deadlines().await.unwrap().is_empty());

    // Firing again is a no-op.
    assert_eq!(h.dispatcher.expire(ride.id).await.unwrap(), None);
}

#[tokio::test]
async fn accepted_ride_never_expires() {
    let h = Harness::new().await;
    let ride = h.accepted(PaymentMethod::Cash).await;
    h.clock.advance(Duration::minutes(5));

    assert_eq!(h.dispatcher.expire(ride.id).await.unwrap(), None);
    assert_eq!(
        h.store.ride(ride.id).await.unwrap().status,
        RideStatus::Accepted
    );
}

#[tokio::test]
async fn scheduled_ride_matches_when_due() {
    let h = Harness::new().await;
    h.add_captain(CAPTAIN.0, VehicleClass::Mini, 0.5).await;
    let at = t0() + Duration::hours(1);
    let mut request = booking(VehicleClass::Mini, PaymentMethod::Cash);
    request.scheduled_at = Some(at);

    let ride = h.dispatcher.book(RIDER, request).await.unwrap();
    assert_eq!(ride.searching_since, at);
    assert!(ride.offered_to.is_empty());
    assert!(h.events.names_for(Room::Captain(CAPTAIN)).is_empty());

    let supervisor = h.supervisor();
    assert_eq!(supervisor.tick().await.unwrap(), 0);

    h.clock.set(at);
    assert_eq!(supervisor.tick().await.unwrap(), 1);
    assert_eq!(h.events.names_for(Room::Captain(CAPTAIN)), vec!["ride:new-request"]);
    assert_eq!(
        h.store.deadlines().await.unwrap(),
        vec![Deadline {
            ride: ride.id,
            kind: DeadlineKind::Expire,
            due_at: at + Duration::seconds(60),
        }]
    );
}

#[tokio::test]
async fn scheduled_ride_cannot_be_claimed_early() {
    let h = Harness::new().await;
    h.add_captain(CAPTAIN.0, VehicleClass::Mini, 0.5).await;
    let at = t0() + Duration::days(3);
    let mut request = booking(VehicleClass::Mini, PaymentMethod::Cash);
    request.scheduled_at = Some(at);
    let ride = h.dispatcher.book(RIDER, request).await.unwrap();

    let err = h.dispatcher.accept(CAPTAIN, ride.id).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidState(_)), "{err:?}");

    let stored = h.store.ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::Searching);
    assert_eq!(stored.captain, None);
    assert!(!h.store.captain(CAPTAIN).await.unwrap().on_ride);
    assert_eq!(
        h.store.deadlines().await.unwrap(),
        vec![Deadline {
            ride: ride.id,
            kind: DeadlineKind::Dispatch,
            due_at: at,
        }]
    );
    assert!(h.events.names_for(Room::Rider(RIDER)).is_empty());

    h.clock.set(at);
    let accepted = h.dispatcher.accept(CAPTAIN, ride.id).await.unwrap();
    assert_eq!(accepted.status, RideStatus::Accepted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn accept_and_expiry_race_has_one_outcome() {
    for _ in 0..16 {
        let h = Harness::new().await;
        h.add_captain(CAPTAIN.0, VehicleClass::Mini, 0.5).await;
        let ride = h.book(VehicleClass::Mini, PaymentMethod::Cash).await;
        h.clock.advance(Duration::seconds(60));

        let expiry = {
            let dispatcher = h.dispatcher.clone();
            tokio::spawn(async move { dispatcher.expire(ride.id).await })
        };
        let claim = {
            let dispatcher = h.dispatcher.clone();
            tokio::spawn(async move { dispatcher.accept(CAPTAIN, ride.id).await })
        };
        let expired = expiry.await.unwrap().unwrap();
        let accepted = claim.await.unwrap();

        let stored = h.store.ride(ride.id).await.unwrap();
        let captain = h.store.captain(CAPTAIN).await.unwrap();
        match accepted {
            Ok(ride) => {
                assert_eq!(expired, None);
                assert_eq!(ride.status, RideStatus::Accepted);
                assert_eq!(stored.status, RideStatus::Accepted);
                assert_eq!(stored.captain, Some(CAPTAIN));
                assert!(captain.on_ride);
                assert_eq!(h.events.names_for(Room::Rider(RIDER)), vec!["ride:accepted"]);
                assert!(h.store.deadlines().await.unwrap().is_empty());
            }
            Err(err) => {
                assert!(matches!(err, DispatchError::Conflict(_)), "{err:?}");
                let expired = expired.expect("expiry won the race");
                assert_eq!(expired.status, RideStatus::Cancelled);
                assert_eq!(stored.status, RideStatus::Cancelled);
                assert_eq!(stored.captain, None);
                assert!(!captain.on_ride);
                assert_eq!(h.events.names_for(Room::Rider(RIDER)), vec!["ride:cancelled"]);
            }
        }
    }
}

#[tokio::test]
async fn restart_rearms_lost_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rides.json");

    let ride_id = {
        let h = Harness::with_store(MemoryStore::open(SnapshotFile::new(&path)).unwrap()).await;
        let ride = h.book(VehicleClass::Bike, PaymentMethod::Cash).await;
        // Simulate a crash between inserting the ride and arming its deadline.
        h.store.clear_deadlines(ride.id).await.unwrap();
        ride.id
    };

    let h = Harness::with_store(MemoryStore::open(SnapshotFile::new(&path)).unwrap()).await;
    let supervisor = h.supervisor();
    let report = supervisor.recover().await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            searching: 1,
            armed: 1
        }
    );

    h.clock.advance(Duration::seconds(60));
    assert_eq!(supervisor.tick().await.unwrap(), 1);
    assert_eq!(
        h.store.ride(ride_id).await.unwrap().status,
        RideStatus::Cancelled
    );
}

// ========== After the trip ==========

#[tokio::test]
async fn second_rating_conflicts() {
    let h = Harness::new().await;
    let ride = h.completed(PaymentMethod::Cash).await;

    h.dispatcher
        .rate(Actor::Rider(RIDER), ride.id, 4, "smooth")
        .await
        .unwrap();
    assert_eq!(h.store.captain(CAPTAIN).await.unwrap().rating, 4.0);

    let err = h
        .dispatcher
        .rate(Actor::Rider(RIDER), ride.id, 1, "changed my mind")
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Conflict("ride already rated".into()));
    let stored = h.store.ride(ride.id).await.unwrap();
    assert_eq!(stored.ratings.by_rider.unwrap().stars, 4);
    assert_eq!(h.store.captain(CAPTAIN).await.unwrap().rating, 4.0);

    // The captain's side is independent.
    h.dispatcher
        .rate(Actor::Captain(CAPTAIN), ride.id, 5, "")
        .await
        .unwrap();
}

#[tokio::test]
async fn tips_credit_the_captain() {
    let h = Harness::new().await;
    let ride = h.completed(PaymentMethod::Cash).await;
    let commission = h.wallet.balance(Account::Captain(CAPTAIN));

    let tipped = h.dispatcher.tip(RIDER, ride.id, 50.0).await.unwrap();
    let tipped = h.dispatcher.tip(RIDER, tipped.id, 20.0).await.unwrap();

    assert_eq!(tipped.tip_total, 70.0);
    assert_eq!(tipped.status, RideStatus::Completed);
    assert_eq!(
        h.wallet.balance(Account::Captain(CAPTAIN)),
        round2(commission + 70.0)
    );

    let err = h.dispatcher.tip(RIDER, ride.id, 600.0).await.unwrap_err();
    assert!(matches!(err, DispatchError::ValidationFailed(_)));
}

#[tokio::test]
async fn unapproved_captain_cannot_go_online() {
    let h = Harness::new().await;
    let captain = Captain::new(
        CaptainId(40),
        "Ravi",
        VehicleClass::Auto,
        ApprovalStatus::Pending,
        t0(),
    );
    h.dispatcher.register_captain(captain).await.unwrap();

    let err = h
        .dispatcher
        .go_online(CaptainId(40), pickup().point)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Unauthorized(_)));
}
