//! Web layer for the ride dispatch server.
//!
//! Exposes the dispatcher over JSON HTTP endpoints, a WebSocket channel per
//! rider or captain session, and a small HTML board of recent rides.

mod dto;
mod routes;
mod state;
pub mod templates;
mod ws;

pub use dto::*;
pub use routes::{ACTOR_HEADER, AppError, create_router};
pub use state::AppState;
pub use templates::*;
