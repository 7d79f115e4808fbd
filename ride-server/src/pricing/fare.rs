//! Fare model.
//!
//! A pure function from ride parameters to a cost breakdown. Safe to call at
//! any rate for estimates; nothing here touches the store.

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, VehicleClass};

use super::config::PricingConfig;
use super::round_cents;

/// Itemised cost of a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub vehicle_class: VehicleClass,
    pub distance_km: f64,
    pub duration_min: f64,
    pub surge_multiplier: f64,

    pub base: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub surge_fare: f64,
    pub discount: f64,
    /// Tolls added at completion.
    pub toll: f64,
    /// Waiting charge added at completion.
    pub waiting_charge: f64,
    pub total: f64,
    pub platform_fee: f64,
    pub captain_earnings: f64,
}

/// Extras reported by the captain when completing a ride.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FareAdjustments {
    pub toll: f64,
    pub waiting_minutes: f64,
}

impl FareAdjustments {
    pub fn validate(&self) -> Result<(), DomainError> {
        non_negative("toll", self.toll)?;
        non_negative("waiting_minutes", self.waiting_minutes)
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), DomainError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DomainError::OutOfRange { field, value })
    }
}

/// Computes fares from the configured rate table.
#[derive(Debug, Clone)]
pub struct FareModel {
    config: PricingConfig,
}

impl FareModel {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Compute the breakdown for a ride.
    ///
    /// `total = max(base + distance + time + surge - discount, minimum)`.
    /// Surge applies to the variable components only. The discount is
    /// clamped to the pre-discount subtotal so it can never push the total
    /// negative.
    pub fn fare(
        &self,
        class: VehicleClass,
        distance_km: f64,
        duration_min: f64,
        surge_multiplier: f64,
        coupon_discount: f64,
    ) -> Result<FareBreakdown, DomainError> {
        non_negative("distance_km", distance_km)?;
        non_negative("duration_min", duration_min)?;
        non_negative("coupon_discount", coupon_discount)?;
        if !surge_multiplier.is_finite() || surge_multiplier < 1.0 {
            return Err(DomainError::OutOfRange {
                field: "surge_multiplier",
                value: surge_multiplier,
            });
        }

        let rates = self.config.rates.for_class(class);
        let base = round_cents(rates.base_fare);
        let distance_fare = round_cents(distance_km * rates.per_km);
        let time_fare = round_cents(duration_min * rates.per_minute);
        let surge_fare = round_cents((distance_fare + time_fare) * (surge_multiplier - 1.0));

        let subtotal = base + distance_fare + time_fare + surge_fare;
        let discount = round_cents(coupon_discount.min(subtotal));
        let total = round_cents((subtotal - discount).max(rates.minimum_fare));

        let mut breakdown = FareBreakdown {
            vehicle_class: class,
            distance_km,
            duration_min,
            surge_multiplier,
            base,
            distance_fare,
            time_fare,
            surge_fare,
            discount,
            toll: 0.0,
            waiting_charge: 0.0,
            total,
            platform_fee: 0.0,
            captain_earnings: 0.0,
        };
        self.split(&mut breakdown);
        Ok(breakdown)
    }

    /// Add completion-time tolls and waiting charges to an existing breakdown.
    pub fn apply_adjustments(
        &self,
        breakdown: &FareBreakdown,
        adjustments: FareAdjustments,
    ) -> Result<FareBreakdown, DomainError> {
        adjustments.validate()?;
        let rates = self.config.rates.for_class(breakdown.vehicle_class);

        let mut adjusted = breakdown.clone();
        adjusted.toll = round_cents(adjustments.toll);
        adjusted.waiting_charge = round_cents(adjustments.waiting_minutes * rates.waiting_per_minute);
        // Re-derive from the pre-adjustment total so repeated calls don't stack.
        let prior_extras = breakdown.toll + breakdown.waiting_charge;
        adjusted.total =
            round_cents(breakdown.total - prior_extras + adjusted.toll + adjusted.waiting_charge);
        self.split(&mut adjusted);
        Ok(adjusted)
    }

    /// Fill in platform fee and captain earnings from the total.
    fn split(&self, breakdown: &mut FareBreakdown) {
        breakdown.platform_fee = round_cents(breakdown.total * self.config.commission_rate);
        breakdown.captain_earnings = round_cents(breakdown.total - breakdown.platform_fee);
    }
}

impl Default for FareModel {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn class_strategy() -> impl Strategy<Value = VehicleClass> {
        prop::sample::select(VehicleClass::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn total_never_below_minimum(
            class in class_strategy(),
            distance in 0.0f64..200.0,
            duration in 0.0f64..300.0,
            surge in 1.0f64..3.0,
            discount in 0.0f64..1000.0,
        ) {
            let model = FareModel::default();
            let fare = model.fare(class, distance, duration, surge, discount).unwrap();
            let minimum = model.config().rates.for_class(class).minimum_fare;

            prop_assert!(fare.total >= 0.0);
            prop_assert!(fare.total >= minimum);
            prop_assert!(fare.platform_fee >= 0.0);
            prop_assert!((fare.platform_fee + fare.captain_earnings - fare.total).abs() < 0.011);
        }

        #[test]
        fn total_is_non_decreasing_in_surge(
            class in class_strategy(),
            distance in 0.0f64..50.0,
            duration in 0.0f64..90.0,
            low in 1.0f64..2.0,
            bump in 0.0f64..1.0,
        ) {
            let model = FareModel::default();
            let a = model.fare(class, distance, duration, low, 0.0).unwrap();
            let b = model.fare(class, distance, duration, low + bump, 0.0).unwrap();
            prop_assert!(b.total + 0.011 >= a.total);
        }
    }
}
