//! Domain error types.
//!
//! These errors represent validation failures when constructing domain
//! values from untrusted input. They are distinct from state-machine and
//! IO errors.

/// Domain-level errors for validation of value types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Latitude/longitude out of range or not finite
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// Unknown vehicle class name
    #[error("unknown vehicle class: {0}")]
    UnknownVehicleClass(String),

    /// Unknown payment method name
    #[error("unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Malformed identifier
    #[error("invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },

    /// Malformed public ride code
    #[error("invalid ride code: {0}")]
    InvalidRideCode(&'static str),

    /// Malformed actor descriptor
    #[error("invalid actor: {0}")]
    InvalidActor(String),

    /// A numeric amount outside its permitted range
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::InvalidCoordinates("latitude 91".into());
        assert_eq!(err.to_string(), "invalid coordinates: latitude 91");

        let err = DomainError::UnknownVehicleClass("boat".into());
        assert_eq!(err.to_string(), "unknown vehicle class: boat");

        let err = DomainError::InvalidId {
            kind: "captain",
            value: "x1".into(),
        };
        assert_eq!(err.to_string(), "invalid captain id: x1");

        let err = DomainError::OutOfRange {
            field: "tip",
            value: -1.0,
        };
        assert_eq!(err.to_string(), "tip out of range: -1");
    }
}
