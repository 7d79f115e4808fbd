//! Pickup ETAs.

use crate::directions::Directions;
use crate::domain::GeoPoint;

/// Minutes to cover `distance_km` at `speed_kmh`.
pub fn straight_line_eta(distance_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return f64::INFINITY;
    }
    distance_km / speed_kmh * 60.0
}

/// Ask the directions provider for a road ETA, keeping `fallback_min` if it
/// cannot answer.
pub async fn refine_eta(
    directions: &dyn Directions,
    from: GeoPoint,
    to: GeoPoint,
    fallback_min: f64,
) -> f64 {
    match directions.route(from, to).await {
        Ok(route) => route.duration_min,
        Err(e) => {
            tracing::warn!(error = %e, "Directions unavailable, keeping straight-line ETA");
            fallback_min
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directions::{FixedDirections, UnavailableDirections};

    #[test]
    fn straight_line() {
        assert_eq!(straight_line_eta(5.0, 25.0), 12.0);
        assert_eq!(straight_line_eta(0.0, 25.0), 0.0);
        assert!(straight_line_eta(1.0, 0.0).is_infinite());
    }

    #[tokio::test]
    async fn refine_prefers_directions() {
        let from = GeoPoint::new(12.97, 77.59).unwrap();
        let to = GeoPoint::new(12.98, 77.60).unwrap();
        let directions = FixedDirections::new(60.0);

        let eta = refine_eta(&directions, from, to, 99.0).await;
        assert!((eta - from.distance_km(&to)).abs() < 1e-9);

        let eta = refine_eta(&UnavailableDirections, from, to, 99.0).await;
        assert_eq!(eta, 99.0);
    }
}
