//! Dispatch orchestration.
//!
//! The [`Dispatcher`] owns the race-safe acceptance guard, fan-out and every
//! lifecycle transition after booking. The [`DeadlineSupervisor`] fires the
//! durable matching and scheduling deadlines it arms.

mod clock;
mod config;
mod error;
mod fanout;
mod orchestrator;
mod supervisor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DispatchConfig;
pub use error::DispatchError;
pub use orchestrator::{
    BookingRequest, Collaborators, DispatchSettings, Dispatcher, Estimate, EstimateRequest,
};
pub use supervisor::{DeadlineSupervisor, RecoveryReport};
