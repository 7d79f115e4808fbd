//! Caching layer for directions responses.
//!
//! Keys are coordinates rounded to a fixed number of decimals, so requests
//! a few metres apart share an entry. Only successful lookups are cached.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use moka::future::Cache as MokaCache;
use serde::{Deserialize, Serialize};

use crate::domain::GeoPoint;

use super::error::DirectionsError;
use super::{Directions, Route};

/// Rounded `(from_lat, from_lng, to_lat, to_lng)`.
type RouteKey = (i64, i64, i64, i64);

/// Configuration for the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for cached entries, in seconds.
    pub ttl_secs: u64,

    /// Maximum number of cached entries.
    pub max_capacity: u64,

    /// Decimal places kept when rounding coordinates into keys.
    pub precision_decimals: u32,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.ttl_secs = secs;
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_capacity: 10_000,
            precision_decimals: 4,
        }
    }
}

/// Directions provider with caching.
pub struct CachedDirections {
    inner: Arc<dyn Directions>,
    routes: MokaCache<RouteKey, Arc<Route>>,
    scale: f64,
}

impl CachedDirections {
    pub fn new(inner: Arc<dyn Directions>, config: &CacheConfig) -> Self {
        let routes = MokaCache::builder()
            .time_to_live(config.ttl())
            .max_capacity(config.max_capacity)
            .build();

        Self {
            inner,
            routes,
            scale: 10_f64.powi(config.precision_decimals as i32),
        }
    }

    fn key(&self, from: GeoPoint, to: GeoPoint) -> RouteKey {
        let round = |v: f64| (v * self.scale).round() as i64;
        (
            round(from.lat()),
            round(from.lng()),
            round(to.lat()),
            round(to.lng()),
        )
    }

    async fn cached_route(&self, from: GeoPoint, to: GeoPoint) -> Result<Route, DirectionsError> {
        let key = self.key(from, to);

        if let Some(cached) = self.routes.get(&key).await {
            return Ok((*cached).clone());
        }

        let route = self.inner.route(from, to).await?;
        self.routes.insert(key, Arc::new(route.clone())).await;
        Ok(route)
    }

    /// Get cache statistics.
    pub fn entry_count(&self) -> u64 {
        self.routes.entry_count()
    }
}

impl Directions for CachedDirections {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> BoxFuture<'_, Result<Route, DirectionsError>> {
        Box::pin(self.cached_route(from, to))
    }
}
