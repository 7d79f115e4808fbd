//! Fare computation and surge pricing.

mod config;
mod fare;
mod surge;

pub use config::{ClassRates, PricingConfig, RateTable, SurgeConfig, SurgeStep};
pub use fare::{FareAdjustments, FareBreakdown, FareModel};
pub use surge::{SurgeEstimate, SurgeEstimator, surge_multiplier};

/// Round a currency amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
