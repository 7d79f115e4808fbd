//! Captain locator: who can serve a pickup, best first.
//!
//! Searches the store's spatial index in widening passes until a pass finds
//! someone or the radius cap is reached, then ranks what it found.

mod config;
mod eta;
mod rank;

pub use config::LocatorConfig;
pub use eta::{refine_eta, straight_line_eta};
pub use rank::{Candidate, rank_candidates};

use std::sync::Arc;

use crate::directions::Directions;
use crate::domain::{CaptainId, GeoPoint, VehicleClass};
use crate::store::{RideStore, StoreError};

/// Finds and ranks nearby captains.
#[derive(Clone)]
pub struct CaptainLocator {
    config: LocatorConfig,
    store: Arc<dyn RideStore>,
    directions: Arc<dyn Directions>,
}

impl CaptainLocator {
    pub fn new(
        config: LocatorConfig,
        store: Arc<dyn RideStore>,
        directions: Arc<dyn Directions>,
    ) -> Self {
        Self {
            config,
            store,
            directions,
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Ranked candidates for a pickup, skipping anyone in `exclude`.
    pub async fn find(
        &self,
        pickup: GeoPoint,
        class: VehicleClass,
        exclude: &[CaptainId],
    ) -> Result<Vec<Candidate>, StoreError> {
        for radius_km in self.config.radii() {
            let candidates: Vec<Candidate> = self
                .store
                .available_captains_near(pickup, class, radius_km)
                .await?
                .into_iter()
                .filter(|nearby| !exclude.contains(&nearby.captain.id))
                .map(|nearby| Candidate {
                    eta_min: straight_line_eta(nearby.distance_km, self.config.average_speed_kmh),
                    distance_km: nearby.distance_km,
                    captain: nearby.captain,
                })
                .collect();

            if !candidates.is_empty() {
                tracing::debug!(
                    %class,
                    radius_km,
                    found = candidates.len(),
                    "Located captains"
                );
                return Ok(rank_candidates(candidates, self.config.max_candidates));
            }
            tracing::trace!(%class, radius_km, "No captains in radius, widening");
        }
        Ok(Vec::new())
    }

    /// How many captains are available within the first search radius.
    pub async fn nearby_count(
        &self,
        pickup: GeoPoint,
        class: VehicleClass,
    ) -> Result<usize, StoreError> {
        Ok(self
            .store
            .available_captains_near(pickup, class, self.config.initial_radius_km)
            .await?
            .len())
    }

    /// ETA from `from` to the pickup, by road when the directions provider
    /// answers.
    pub async fn pickup_eta(&self, from: GeoPoint, pickup: GeoPoint) -> f64 {
        let fallback = straight_line_eta(from.distance_km(&pickup), self.config.average_speed_kmh);
        refine_eta(self.directions.as_ref(), from, pickup, fallback).await
    }
}
