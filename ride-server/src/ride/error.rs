//! Ride ledger errors: guard violations raised by lifecycle transitions.

use chrono::{DateTime, Utc};

use crate::domain::DomainError;

use super::RideStatus;

/// Why a lifecycle transition was refused.
///
/// Every variant leaves the ride unmodified.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// The ride is no longer searching when a captain tries to accept it
    #[error("ride no longer available")]
    NoLongerAvailable,

    /// The operation is not valid in the ride's current status
    #[error("cannot {operation} a ride that is {status}")]
    InvalidState {
        operation: &'static str,
        status: RideStatus,
    },

    /// The ride has already been cancelled
    #[error("ride already cancelled")]
    AlreadyCancelled,

    /// This party already rated the ride
    #[error("ride already rated")]
    AlreadyRated,

    /// The actor is not the ride's rider or assigned captain
    #[error("{0} is not a party to this ride")]
    NotAParty(String),

    /// The submitted one-time code is wrong
    #[error("invalid code")]
    InvalidCode,

    /// The matching deadline has not passed yet
    #[error("matching deadline not reached")]
    NotDue,

    /// A scheduled ride is not open to captains until its pickup time
    #[error("ride is scheduled for {0}")]
    Scheduled(DateTime<Utc>),

    /// A value failed validation
    #[error(transparent)]
    Invalid(#[from] DomainError),
}
