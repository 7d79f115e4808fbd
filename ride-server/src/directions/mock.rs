//! In-process directions providers for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;

use crate::domain::GeoPoint;

use super::error::DirectionsError;
use super::{Directions, Route, RouteSource};

/// Answers every query with a straight line at a fixed speed and counts
/// how often it was asked.
#[derive(Debug)]
pub struct FixedDirections {
    speed_kmh: f64,
    calls: AtomicUsize,
}

impl FixedDirections {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_kmh,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of routes served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Directions for FixedDirections {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> BoxFuture<'_, Result<Route, DirectionsError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let distance_km = from.distance_km(&to);
        let route = Route {
            distance_km,
            duration_min: distance_km / self.speed_kmh * 60.0,
            path: vec![from, to],
            source: RouteSource::Directions,
        };
        Box::pin(async move { Ok(route) })
    }
}

/// A provider that is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDirections;

impl Directions for UnavailableDirections {
    fn route(&self, _from: GeoPoint, _to: GeoPoint) -> BoxFuture<'_, Result<Route, DirectionsError>> {
        Box::pin(async {
            Err(DirectionsError::ApiError {
                status: 503,
                message: "service unavailable".to_string(),
            })
        })
    }
}
