//! Ride-hailing dispatch server.
//!
//! Books rides, matches them to nearby captains, and drives each ride
//! through its lifecycle to settlement, with live updates pushed to the
//! rider and captain over WebSockets.

pub mod config;
pub mod coupons;
pub mod directions;
pub mod dispatch;
pub mod domain;
pub mod locator;
pub mod pricing;
pub mod realtime;
pub mod retry;
pub mod ride;
pub mod store;
pub mod wallet;
pub mod web;
