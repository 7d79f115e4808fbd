//! Candidate ranking.

use std::cmp::Ordering;

use serde::Serialize;

use crate::domain::Captain;

/// A captain that passed the availability filter for a pickup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub captain: Captain,
    pub distance_km: f64,
    pub eta_min: f64,
}

/// Rank candidates best-first and keep at most `limit`.
///
/// Candidates are ranked by:
/// 1. Distance to pickup (nearer is better)
/// 2. Rating (higher is better)
/// 3. Recent cancellation rate (lower is better)
///
/// Remaining ties go to the lower captain id so the order is stable.
pub fn rank_candidates(mut candidates: Vec<Candidate>, limit: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        let distance = a.distance_km.total_cmp(&b.distance_km);
        if distance != Ordering::Equal {
            return distance;
        }

        let rating = b.captain.rating.total_cmp(&a.captain.rating);
        if rating != Ordering::Equal {
            return rating;
        }

        let cancellations = a
            .captain
            .cancellation_rate()
            .total_cmp(&b.captain.cancellation_rate());
        if cancellations != Ordering::Equal {
            return cancellations;
        }

        a.captain.id.cmp(&b.captain.id)
    });
    candidates.truncate(limit);
    candidates
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{GeoPoint, VehicleClass};
    use crate::ride::test_support::online_captain;
    use proptest::prelude::*;

    fn candidate_strategy() -> impl Strategy<Value = Candidate> {
        (1u64..1000, 0.0f64..15.0, 1.0f64..5.0, 0u32..10, 0u32..10).prop_map(
            |(id, distance_km, rating, accepts, cancels)| {
                let mut captain =
                    online_captain(id, VehicleClass::Mini, GeoPoint::new(0.0, 0.0).unwrap());
                captain.rating = rating;
                captain.recent_accepts = accepts;
                captain.recent_cancellations = cancels;
                Candidate {
                    captain,
                    distance_km,
                    eta_min: 0.0,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn sorted_and_bounded(
            candidates in prop::collection::vec(candidate_strategy(), 0..40),
            limit in 0usize..20,
        ) {
            let n = candidates.len();
            let ranked = rank_candidates(candidates, limit);

            prop_assert_eq!(ranked.len(), n.min(limit));
            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.distance_km <= b.distance_km);
                if a.distance_km == b.distance_km {
                    prop_assert!(a.captain.rating >= b.captain.rating);
                }
            }
        }

        #[test]
        fn keeps_the_nearest(candidates in prop::collection::vec(candidate_strategy(), 1..40)) {
            let nearest = candidates
                .iter()
                .map(|c| c.distance_km)
                .fold(f64::INFINITY, f64::min);
            let ranked = rank_candidates(candidates, 1);
            prop_assert_eq!(ranked[0].distance_km, nearest);
        }
    }
}
