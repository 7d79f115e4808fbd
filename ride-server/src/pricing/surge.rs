//! Surge estimation.
//!
//! The multiplier is a step function of nearby supply, nudged upward when
//! demand heavily outweighs supply. It is recomputed from the store for
//! every estimate and booking; nothing is cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{GeoPoint, VehicleClass};
use crate::store::{RideStore, StoreError};

use super::config::SurgeConfig;

/// Multiplier for the given demand (searching rides) and supply (available
/// captains).
pub fn surge_multiplier(config: &SurgeConfig, demand: usize, supply: usize) -> f64 {
    let mut multiplier = config
        .steps
        .iter()
        .find(|step| supply < step.below_supply as usize)
        .map_or(1.0, |step| step.multiplier);

    let pressure_floor = config.demand_pressure_ratio * supply.max(1) as f64;
    if demand > 0 && demand as f64 >= pressure_floor {
        multiplier += config.demand_pressure_step;
    }

    multiplier.clamp(config.min_multiplier, config.max_multiplier)
}

/// Result of one surge sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurgeEstimate {
    pub multiplier: f64,
    pub demand: usize,
    pub supply: usize,
}

/// Samples demand and supply around a pickup point.
#[derive(Clone)]
pub struct SurgeEstimator {
    config: SurgeConfig,
    store: Arc<dyn RideStore>,
}

impl SurgeEstimator {
    pub fn new(config: SurgeConfig, store: Arc<dyn RideStore>) -> Self {
        Self { config, store }
    }

    pub async fn estimate(
        &self,
        pickup: GeoPoint,
        class: VehicleClass,
        now: DateTime<Utc>,
    ) -> Result<SurgeEstimate, StoreError> {
        let since = now - self.config.demand_window();
        let demand = self
            .store
            .count_searching_near(pickup, class, self.config.radius_km, since, now)
            .await?;
        let supply = self
            .store
            .available_captains_near(pickup, class, self.config.radius_km)
            .await?
            .len();

        let multiplier = surge_multiplier(&self.config, demand, supply);
        tracing::debug!(%class, demand, supply, multiplier, "Surge sampled");

        Ok(SurgeEstimate {
            multiplier,
            demand,
            supply,
        })
    }
}
