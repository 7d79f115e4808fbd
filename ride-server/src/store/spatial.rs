//! H3 cell index over captain locations.
//!
//! Captains are bucketed by their resolution-8 cell. A radius query expands
//! to the grid disk that covers the radius; callers filter the candidates by
//! exact distance afterwards.

use std::collections::{HashMap, HashSet};

use h3o::{CellIndex, LatLng, Resolution};

use crate::domain::{CaptainId, GeoPoint};

const RESOLUTION: Resolution = Resolution::Eight;

/// Lower bound on the centre-to-centre spacing of neighbouring resolution-8
/// cells, in kilometres. Undershooting only widens the disk.
const MIN_CELL_SPACING_KM: f64 = 0.5;

fn cell_of(point: GeoPoint) -> Option<CellIndex> {
    LatLng::new(point.lat(), point.lng())
        .ok()
        .map(|ll| ll.to_cell(RESOLUTION))
}

/// Captain ids bucketed by H3 cell.
#[derive(Debug, Default)]
pub struct CaptainIndex {
    by_cell: HashMap<CellIndex, HashSet<CaptainId>>,
    cell_of_captain: HashMap<CaptainId, CellIndex>,
}

impl CaptainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place (or move) a captain. `None` removes them from the index.
    pub fn update(&mut self, captain: CaptainId, location: Option<GeoPoint>) {
        let new_cell = location.and_then(cell_of);
        let old_cell = self.cell_of_captain.get(&captain).copied();
        if old_cell == new_cell {
            return;
        }

        if let Some(old) = old_cell {
            if let Some(ids) = self.by_cell.get_mut(&old) {
                ids.remove(&captain);
                if ids.is_empty() {
                    self.by_cell.remove(&old);
                }
            }
            self.cell_of_captain.remove(&captain);
        }

        if let Some(cell) = new_cell {
            self.by_cell.entry(cell).or_default().insert(captain);
            self.cell_of_captain.insert(captain, cell);
        }
    }

    /// Captains whose cell lies within the disk covering `radius_km`.
    ///
    /// A superset of the captains within the radius.
    pub fn candidates(&self, center: GeoPoint, radius_km: f64) -> Vec<CaptainId> {
        let Some(origin) = cell_of(center) else {
            return Vec::new();
        };
        let k = (radius_km.max(0.0) / MIN_CELL_SPACING_KM).ceil() as u32 + 1;

        origin
            .grid_disk::<Vec<_>>(k)
            .into_iter()
            .filter_map(|cell| self.by_cell.get(&cell))
            .flatten()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cell_of_captain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_of_captain.is_empty()
    }
}
