//! OSRM-compatible HTTP directions client.
//!
//! Queries `{base}/route/v1/driving/{lng},{lat};{lng},{lat}` with GeoJSON
//! geometry. Concurrent upstream calls are bounded by a semaphore, and
//! transient failures are retried with bounded backoff.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::domain::GeoPoint;
use crate::retry::{RetryPolicy, with_backoff};

use super::error::DirectionsError;
use super::{Directions, Route, RouteSource};

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Configuration for the directions client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionsConfig {
    /// Base URL of the routing service. `None` disables the client.
    pub base_url: Option<String>,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl DirectionsConfig {
    /// Create a config pointing at the given routing service.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 5,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Metres.
    distance: f64,
    /// Seconds.
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `[lng, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

/// Decode an OSRM route response body.
fn parse_route(body: &str, from: GeoPoint, to: GeoPoint) -> Result<Route, DirectionsError> {
    let response: OsrmResponse = serde_json::from_str(body).map_err(|e| DirectionsError::Json {
        message: e.to_string(),
        body: Some(body.chars().take(500).collect()),
    })?;

    if response.code != "Ok" {
        return Err(DirectionsError::NoRoute);
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or(DirectionsError::NoRoute)?;

    let mut path: Vec<GeoPoint> = route
        .geometry
        .coordinates
        .iter()
        .filter_map(|[lng, lat]| GeoPoint::new(*lat, *lng).ok())
        .collect();
    if path.is_empty() {
        path = vec![from, to];
    }

    Ok(Route {
        distance_km: route.distance / 1000.0,
        duration_min: route.duration / 60.0,
        path,
        source: RouteSource::Directions,
    })
}

/// OSRM HTTP client.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl OsrmClient {
    /// Create a new client. Fails if no base URL is configured.
    pub fn new(config: DirectionsConfig) -> Result<Self, DirectionsError> {
        let base_url = config.base_url.ok_or(DirectionsError::NotConfigured)?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            retry: config.retry,
        })
    }

    async fn fetch(&self, from: GeoPoint, to: GeoPoint) -> Result<Route, DirectionsError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| DirectionsError::ApiError {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url,
            from.lng(),
            from.lat(),
            to.lng(),
            to.lat()
        );

        let response = self
            .http
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DirectionsError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectionsError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        parse_route(&body, from, to)
    }

    /// Fetch a driving route, retrying transient failures.
    pub async fn driving_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<Route, DirectionsError> {
        with_backoff(
            &self.retry,
            "directions",
            DirectionsError::is_transient,
            move || self.fetch(from, to),
        )
        .await
    }
}

impl Directions for OsrmClient {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> BoxFuture<'_, Result<Route, DirectionsError>> {
        Box::pin(self.driving_route(from, to))
    }
}
