//! Route and ETA lookup.
//!
//! The dispatcher works against the [`Directions`] trait. The production
//! implementation is an OSRM-compatible HTTP client behind a moka cache;
//! whenever it is unavailable callers fall back to [`heuristic_route`], a
//! straight-line estimate with a detour factor.

mod cache;
mod client;
mod error;
mod mock;

pub use cache::{CacheConfig, CachedDirections};
pub use client::{DirectionsConfig, OsrmClient};
pub use error::DirectionsError;
pub use mock::{FixedDirections, UnavailableDirections};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::GeoPoint;

/// Road distance is rarely the crow-flies distance.
pub const DETOUR_FACTOR: f64 = 1.3;

/// Assumed average city speed for heuristic ETAs.
pub const AVERAGE_SPEED_KMH: f64 = 25.0;

/// Where a route came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteSource {
    Directions,
    #[default]
    Heuristic,
}

/// A route between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub distance_km: f64,
    pub duration_min: f64,
    /// Waypoints along the route, endpoints included.
    pub path: Vec<GeoPoint>,
    pub source: RouteSource,
}

/// Minutes to cover `distance_km` at the assumed average speed.
pub fn heuristic_minutes(distance_km: f64) -> f64 {
    distance_km / AVERAGE_SPEED_KMH * 60.0
}

/// Straight-line route, stretched by [`DETOUR_FACTOR`].
pub fn heuristic_route(from: GeoPoint, to: GeoPoint) -> Route {
    let distance_km = from.distance_km(&to) * DETOUR_FACTOR;
    Route {
        distance_km,
        duration_min: heuristic_minutes(distance_km),
        path: vec![from, to],
        source: RouteSource::Heuristic,
    }
}

/// A route provider.
pub trait Directions: Send + Sync {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> BoxFuture<'_, Result<Route, DirectionsError>>;
}

/// Ask `directions` for a route, degrading to the heuristic on any failure.
pub async fn route_or_heuristic(directions: &dyn Directions, from: GeoPoint, to: GeoPoint) -> Route {
    match directions.route(from, to).await {
        Ok(route) => route,
        Err(e) => {
            tracing::warn!(error = %e, "Directions unavailable, using heuristic route");
            heuristic_route(from, to)
        }
    }
}
