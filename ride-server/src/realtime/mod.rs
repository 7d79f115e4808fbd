//! Real-time channel to rider and captain sessions.

mod events;
mod registry;

pub use events::{CaptainSummary, RideEvent, RideOffer};
pub use registry::{ConnectionRegistry, EventSink, Room, Subscription};
