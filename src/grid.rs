//! Road grid and road-snapped locations.

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Boolean grid of passable cells, indexed `[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadNetwork {
    size: usize,
    cells: Vec<bool>,
}

impl RoadNetwork {
    /// Network of `size * size` cells with no roads.
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            cells: vec![false; size * size],
        }
    }

    /// Build from row-major rows; every row must be `rows.len()` long.
    pub fn from_rows(rows: &[Vec<bool>]) -> Result<Self, SchedulerError> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return Err(SchedulerError::InvalidConfig(
                "road network must be square".to_string(),
            ));
        }
        Ok(Self {
            size,
            cells: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.size && (y as usize) < self.size
    }

    pub fn is_road(&self, x: i64, y: i64) -> bool {
        self.in_bounds(x, y) && self.cells[y as usize * self.size + x as usize]
    }

    pub fn set_road(&mut self, x: usize, y: usize, road: bool) {
        if x < self.size && y < self.size {
            self.cells[y * self.size + x] = road;
        }
    }

    pub fn road_count(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell).count()
    }

    /// Passable 4-neighbours of a cell.
    pub fn neighbors(&self, x: i64, y: i64) -> impl Iterator<Item = (i64, i64)> + '_ {
        [(0, 1), (1, 0), (0, -1), (-1, 0)]
            .into_iter()
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(|&(nx, ny)| self.is_road(nx, ny))
    }

    /// Nearest road cell by Manhattan distance, searching rings of growing radius.
    ///
    /// Within a ring, cells are visited by ascending `dy` then `dx`, which makes
    /// the result deterministic.
    pub fn nearest_road(&self, x: i64, y: i64) -> Option<(i64, i64)> {
        if self.is_road(x, y) {
            return Some((x, y));
        }
        let max_radius = 2 * self.size as i64;
        for radius in 1..=max_radius {
            for dy in -radius..=radius {
                let rest = radius - dy.abs();
                for dx in [-rest, rest] {
                    if self.is_road(x + dx, y + dy) {
                        return Some((x + dx, y + dy));
                    }
                    if rest == 0 {
                        break;
                    }
                }
            }
        }
        None
    }
}

/// Integer grid coordinates, always on a road cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub x: i64,
    pub y: i64,
}

impl Location {
    /// Snap `(x, y)` to the nearest road cell.
    ///
    /// Coordinates outside the grid are rejected; a map without roads yields
    /// [`SchedulerError::NoRoads`].
    pub fn snapped(x: i64, y: i64, roads: &RoadNetwork) -> Result<Self, SchedulerError> {
        if !roads.in_bounds(x, y) {
            return Err(SchedulerError::LocationOutOfBounds {
                x,
                y,
                size: roads.size(),
            });
        }
        let (x, y) = roads.nearest_road(x, y).ok_or(SchedulerError::NoRoads)?;
        Ok(Self { x, y })
    }

    pub fn manhattan_distance(&self, other: &Location) -> u64 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn euclidean_distance(&self, other: &Location) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross() -> RoadNetwork {
        // Horizontal road on y = 2, vertical road on x = 2.
        let mut roads = RoadNetwork::empty(5);
        for i in 0..5 {
            roads.set_road(i, 2, true);
            roads.set_road(2, i, true);
        }
        roads
    }

    #[test]
    fn test_on_road_location_is_unchanged() {
        let loc = Location::snapped(2, 4, &cross()).unwrap();
        assert_eq!(loc, Location { x: 2, y: 4 });
    }

    #[test]
    fn test_snaps_to_nearest_road() {
        let loc = Location::snapped(0, 0, &cross()).unwrap();
        // (0, 2) and (2, 0) are both two cells away; dy = 0 comes first in the ring.
        assert_eq!(loc, Location { x: 2, y: 0 });
    }

    #[test]
    fn test_no_roads_is_an_error() {
        let result = Location::snapped(1, 1, &RoadNetwork::empty(4));
        assert!(matches!(result, Err(SchedulerError::NoRoads)));
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let result = Location::snapped(9, 1, &cross());
        assert!(matches!(result, Err(SchedulerError::LocationOutOfBounds { .. })));
    }

    #[test]
    fn test_neighbors_only_roads() {
        let roads = cross();
        let mut neighbors: Vec<_> = roads.neighbors(2, 2).collect();
        neighbors.sort();
        assert_eq!(neighbors, vec![(1, 2), (2, 1), (2, 3), (3, 2)]);
        assert_eq!(roads.neighbors(0, 2).count(), 1);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let rows = vec![vec![true, false], vec![true]];
        assert!(RoadNetwork::from_rows(&rows).is_err());
    }

    #[test]
    fn test_distances() {
        let a = Location { x: 0, y: 0 };
        let b = Location { x: 3, y: 4 };
        assert_eq!(a.manhattan_distance(&b), 7);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-9);
    }
}
