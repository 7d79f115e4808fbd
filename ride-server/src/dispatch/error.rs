//! The error taxonomy callers of the dispatcher see.

use crate::coupons::CouponError;
use crate::domain::DomainError;
use crate::ride::LedgerError;
use crate::store::StoreError;
use crate::wallet::WalletError;

/// Errors that can occur during dispatch operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// The ride or party does not exist
    #[error("{0}")]
    NotFound(String),

    /// Another writer got there first, or the request repeats a one-shot action
    #[error("{0}")]
    Conflict(String),

    /// The ride is not in a status that permits the operation
    #[error("{0}")]
    InvalidState(String),

    /// The actor may not perform the operation
    #[error("{0}")]
    Unauthorized(String),

    /// The request carried an invalid value
    #[error("{0}")]
    ValidationFailed(String),

    /// A collaborator is temporarily unreachable
    #[error("{0}")]
    Unavailable(String),

    /// A collaborator answered with an error
    #[error("{0}")]
    UpstreamFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for DispatchError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::NoLongerAvailable
            | LedgerError::AlreadyCancelled
            | LedgerError::AlreadyRated => DispatchError::Conflict(message),
            LedgerError::InvalidState { .. }
            | LedgerError::NotDue
            | LedgerError::Scheduled(_) => DispatchError::InvalidState(message),
            LedgerError::NotAParty(_) => DispatchError::Unauthorized(message),
            LedgerError::InvalidCode | LedgerError::Invalid(_) => {
                DispatchError::ValidationFailed(message)
            }
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::RideNotFound(_)
            | StoreError::CaptainNotFound(_)
            | StoreError::RiderNotFound(_) => DispatchError::NotFound(message),
            StoreError::VersionMismatch { .. }
            | StoreError::RiderBusy(_)
            | StoreError::CaptainUnavailable { .. } => DispatchError::Conflict(message),
            StoreError::NotTracking(_) => DispatchError::InvalidState(message),
            StoreError::Unavailable(_) => DispatchError::Unavailable(message),
            StoreError::Snapshot(_) => DispatchError::Internal(message),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        DispatchError::ValidationFailed(err.to_string())
    }
}

impl From<CouponError> for DispatchError {
    fn from(err: CouponError) -> Self {
        let message = err.to_string();
        match err {
            CouponError::Unknown(_) | CouponError::BelowMinimum { .. } => {
                DispatchError::ValidationFailed(message)
            }
            CouponError::AlreadyUsed(_) => DispatchError::Conflict(message),
            CouponError::Unavailable(_) => DispatchError::Unavailable(message),
        }
    }
}

impl From<WalletError> for DispatchError {
    fn from(err: WalletError) -> Self {
        let message = err.to_string();
        match err {
            WalletError::Unavailable(_) => DispatchError::Unavailable(message),
            WalletError::Rejected(_) => DispatchError::UpstreamFailure(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaptainId, RideId, RiderId};
    use crate::ride::RideStatus;

    #[test]
    fn error_display() {
        let err = DispatchError::Internal("snapshot lost".into());
        assert_eq!(err.to_string(), "internal error: snapshot lost");

        let err = DispatchError::Conflict("ride no longer available".into());
        assert_eq!(err.to_string(), "ride no longer available");
    }

    #[test]
    fn ledger_errors_map_to_taxonomy() {
        assert_eq!(
            DispatchError::from(LedgerError::NoLongerAvailable),
            DispatchError::Conflict("ride no longer available".into())
        );
        assert_eq!(
            DispatchError::from(LedgerError::InvalidCode),
            DispatchError::ValidationFailed("invalid code".into())
        );
        assert!(matches!(
            DispatchError::from(LedgerError::InvalidState {
                operation: "start",
                status: RideStatus::Searching,
            }),
            DispatchError::InvalidState(_)
        ));
        assert!(matches!(
            DispatchError::from(LedgerError::NotAParty("rider:9".into())),
            DispatchError::Unauthorized(_)
        ));
        assert!(matches!(
            DispatchError::from(LedgerError::AlreadyRated),
            DispatchError::Conflict(_)
        ));
    }

    #[test]
    fn store_errors_map_to_taxonomy() {
        assert!(matches!(
            DispatchError::from(StoreError::RideNotFound(RideId(4))),
            DispatchError::NotFound(_)
        ));
        assert!(matches!(
            DispatchError::from(StoreError::RiderBusy(RiderId(1))),
            DispatchError::Conflict(_)
        ));
        assert!(matches!(
            DispatchError::from(StoreError::CaptainUnavailable {
                captain: CaptainId(2),
                reason: "offline",
            }),
            DispatchError::Conflict(_)
        ));
        assert!(matches!(
            DispatchError::from(StoreError::Unavailable("down".into())),
            DispatchError::Unavailable(_)
        ));
    }
}
