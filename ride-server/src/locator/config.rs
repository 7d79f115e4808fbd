//! Configuration for the captain locator.

use serde::{Deserialize, Serialize};

/// Search parameters for nearby captains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Radius of the first search pass (km).
    pub initial_radius_km: f64,

    /// How much the radius grows after an empty pass (km).
    pub radius_step_km: f64,

    /// The radius is never widened beyond this (km).
    pub max_radius_km: f64,

    /// Maximum number of candidates returned.
    pub max_candidates: usize,

    /// Assumed average speed for straight-line ETAs (km/h).
    pub average_speed_kmh: f64,
}

impl LocatorConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(
        initial_radius_km: f64,
        radius_step_km: f64,
        max_radius_km: f64,
        max_candidates: usize,
        average_speed_kmh: f64,
    ) -> Self {
        Self {
            initial_radius_km,
            radius_step_km,
            max_radius_km,
            max_candidates,
            average_speed_kmh,
        }
    }

    /// The sequence of radii tried, ending at the cap.
    pub fn radii(&self) -> Vec<f64> {
        let mut radii = Vec::new();
        let mut radius = self.initial_radius_km.min(self.max_radius_km);
        loop {
            radii.push(radius);
            if radius >= self.max_radius_km || self.radius_step_km <= 0.0 {
                break;
            }
            radius = (radius + self.radius_step_km).min(self.max_radius_km);
        }
        radii
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            initial_radius_km: 5.0,
            radius_step_km: 5.0,
            max_radius_km: 15.0,
            max_candidates: 15,
            average_speed_kmh: 25.0,
        }
    }
}
