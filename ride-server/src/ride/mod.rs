//! The ride ledger: the ride entity, its statuses, and the guarded
//! transitions between them.

mod error;
mod lifecycle;
mod model;
mod policy;
mod status;

pub use error::LedgerError;
pub use lifecycle::{CancelOutcome, NO_CAPTAIN_REASON, RatedParty};
pub use model::{
    AppliedCoupon, Cancellation, Payment, Rating, Requeue, Ride, RideDraft, RideRatings,
    RideTimestamps, TrackingSample,
};
pub use policy::CancellationPolicy;
pub use status::RideStatus;
