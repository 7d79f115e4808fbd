//! Askama templates for the operations board.

use askama::Template;

use crate::ride::Ride;

/// Recent rides, newest first.
#[derive(Template)]
#[template(path = "board.html")]
pub struct BoardTemplate {
    pub rides: Vec<BoardRow>,
}

/// One ride on the board.
#[derive(Debug, Clone)]
pub struct BoardRow {
    pub code: String,
    pub status: String,
    pub vehicle_class: String,
    pub pickup: String,
    pub destination: String,
    pub captain: String,
    pub fare: String,
    pub surge: String,
}

impl BoardRow {
    pub fn from_ride(ride: &Ride) -> Self {
        Self {
            code: ride.code.to_string(),
            status: ride.status.to_string(),
            vehicle_class: ride.vehicle_class.to_string(),
            pickup: ride.pickup.address.clone(),
            destination: ride.destination.address.clone(),
            captain: ride
                .captain
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            fare: format!("{:.2}", ride.fare.total),
            surge: if ride.surge_multiplier > 1.0 {
                format!("x{:.1}", ride.surge_multiplier)
            } else {
                String::new()
            },
        }
    }
}
