//! Domain types for the ride dispatch server.
//!
//! This module contains the value types shared by every layer: identifiers,
//! coordinates, vehicle classes, actors and the parties of a ride. All types
//! enforce their invariants at construction time.

mod actor;
mod error;
mod geo;
mod ids;
mod otp;
mod party;
mod payment;
mod vehicle;

pub use actor::Actor;
pub use error::DomainError;
pub use geo::{GeoPoint, Place};
pub use ids::{AdminId, CaptainId, RideCode, RideId, RiderId};
pub use otp::OneTimeCode;
pub use party::{ApprovalStatus, Captain, DEFAULT_RATING, Rider, mean_rating};
pub use payment::{PaymentMethod, PaymentStatus};
pub use vehicle::VehicleClass;
