//! Store error types.

use crate::domain::{CaptainId, RideId, RiderId};

/// Errors from a ride store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("ride {0} not found")]
    RideNotFound(RideId),

    #[error("captain {0} not found")]
    CaptainNotFound(CaptainId),

    #[error("rider {0} not found")]
    RiderNotFound(RiderId),

    /// The conditional write lost to a concurrent writer
    #[error("ride {ride} changed concurrently (expected version {expected}, found {actual})")]
    VersionMismatch {
        ride: RideId,
        expected: u64,
        actual: u64,
    },

    /// The rider already holds an active ride
    #[error("rider {0} already has an active ride")]
    RiderBusy(RiderId),

    /// A captain claim failed its availability check
    #[error("captain {captain} is unavailable: {reason}")]
    CaptainUnavailable {
        captain: CaptainId,
        reason: &'static str,
    },

    /// Tracking sample rejected because the ride is outside its tracking window
    #[error("ride {0} is not accepting location samples")]
    NotTracking(RideId),

    /// Snapshot file could not be read or decoded
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// The store cannot serve requests
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
