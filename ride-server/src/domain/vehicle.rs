//! Vehicle classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainError;

/// The class of vehicle a ride is booked for and a captain drives.
///
/// Matching only ever pairs a ride with captains of the same class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Bike,
    Auto,
    Mini,
    Sedan,
    Suv,
}

impl VehicleClass {
    /// Every class, in rate-table order.
    pub const ALL: [VehicleClass; 5] = [
        VehicleClass::Bike,
        VehicleClass::Auto,
        VehicleClass::Mini,
        VehicleClass::Sedan,
        VehicleClass::Suv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Bike => "bike",
            VehicleClass::Auto => "auto",
            VehicleClass::Mini => "mini",
            VehicleClass::Sedan => "sedan",
            VehicleClass::Suv => "suv",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        VehicleClass::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| DomainError::UnknownVehicleClass(s.to_string()))
    }
}
