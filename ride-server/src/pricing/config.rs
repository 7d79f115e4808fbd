//! Pricing configuration: per-class rate table, commission and surge steps.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::VehicleClass;

/// Rates for one vehicle class, in currency units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassRates {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minimum_fare: f64,
    /// Charged per minute the captain waits at pickup, applied at completion.
    pub waiting_per_minute: f64,
}

impl ClassRates {
    pub const fn new(
        base_fare: f64,
        per_km: f64,
        per_minute: f64,
        minimum_fare: f64,
        waiting_per_minute: f64,
    ) -> Self {
        Self {
            base_fare,
            per_km,
            per_minute,
            minimum_fare,
            waiting_per_minute,
        }
    }
}

/// One rate entry per vehicle class.
///
/// A struct rather than a map so that every class always has rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTable {
    pub bike: ClassRates,
    pub auto: ClassRates,
    pub mini: ClassRates,
    pub sedan: ClassRates,
    pub suv: ClassRates,
}

impl RateTable {
    pub fn for_class(&self, class: VehicleClass) -> &ClassRates {
        match class {
            VehicleClass::Bike => &self.bike,
            VehicleClass::Auto => &self.auto,
            VehicleClass::Mini => &self.mini,
            VehicleClass::Sedan => &self.sedan,
            VehicleClass::Suv => &self.suv,
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            bike: ClassRates::new(15.0, 6.0, 1.0, 25.0, 1.0),
            auto: ClassRates::new(25.0, 10.0, 1.5, 40.0, 1.5),
            mini: ClassRates::new(40.0, 12.0, 2.0, 60.0, 2.0),
            sedan: ClassRates::new(50.0, 15.0, 2.5, 80.0, 2.5),
            suv: ClassRates::new(70.0, 20.0, 3.0, 110.0, 3.0),
        }
    }
}

/// Configuration for fare computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Share of the total kept by the platform.
    pub commission_rate: f64,
    pub rates: RateTable,
}

impl PricingConfig {
    pub fn with_commission_rate(mut self, rate: f64) -> Self {
        self.commission_rate = rate;
        self
    }

    pub fn with_rates(mut self, rates: RateTable) -> Self {
        self.rates = rates;
        self
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            commission_rate: 0.20,
            rates: RateTable::default(),
        }
    }
}

/// A surge step: applies when supply is strictly below `below_supply`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurgeStep {
    pub below_supply: u32,
    pub multiplier: f64,
}

/// Longest demand window accepted (one week).
const MAX_DEMAND_WINDOW_MINS: i64 = 10_080;

/// Configuration for the surge estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeConfig {
    /// Radius around the pickup sampled for demand and supply (km).
    pub radius_km: f64,

    /// Trailing window for counting searching rides (minutes).
    pub demand_window_mins: i64,

    /// Supply steps, ascending by `below_supply`; the first match wins.
    pub steps: Vec<SurgeStep>,

    /// Demand at or above this multiple of supply adds `demand_pressure_step`.
    pub demand_pressure_ratio: f64,
    pub demand_pressure_step: f64,

    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl SurgeConfig {
    /// Reject a window the date arithmetic cannot hold and bounds
    /// `f64::clamp` would panic on.
    pub fn validate(&self) -> Result<(), String> {
        if !(0..=MAX_DEMAND_WINDOW_MINS).contains(&self.demand_window_mins) {
            return Err(format!(
                "demand_window_mins must be between 0 and {MAX_DEMAND_WINDOW_MINS}, got {}",
                self.demand_window_mins
            ));
        }
        let (min, max) = (self.min_multiplier, self.max_multiplier);
        if !min.is_finite() || !max.is_finite() || min <= 0.0 || min > max {
            return Err(format!(
                "multiplier bounds must satisfy 0 < min <= max, got {min}..{max}"
            ));
        }
        Ok(())
    }

    /// Returns the demand window as a Duration.
    pub fn demand_window(&self) -> Duration {
        Duration::try_minutes(self.demand_window_mins).unwrap_or(Duration::MAX)
    }
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            radius_km: 3.0,
            demand_window_mins: 10,
            steps: vec![
                SurgeStep {
                    below_supply: 3,
                    multiplier: 2.0,
                },
                SurgeStep {
                    below_supply: 5,
                    multiplier: 1.5,
                },
                SurgeStep {
                    below_supply: 10,
                    multiplier: 1.2,
                },
            ],
            demand_pressure_ratio: 2.0,
            demand_pressure_step: 0.5,
            min_multiplier: 1.0,
            max_multiplier: 3.0,
        }
    }
}
