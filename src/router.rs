//! Road routing over the city grid.
//!
//! A* search over 4-connected road cells with unit edge cost and a Manhattan
//! heuristic. Results are memoized per location pair since the search loop
//! asks for the same legs over and over.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, RwLock};

use crate::grid::{Location, RoadNetwork};
use crate::path::GridPath;
use crate::traits::TravelTimeProvider;

#[derive(Debug)]
pub struct GridRouter {
    roads: Arc<RoadNetwork>,
    speed_kmh: f64,
    cache: RwLock<HashMap<(Location, Location), f64>>,
}

impl GridRouter {
    pub fn new(roads: Arc<RoadNetwork>, speed_kmh: f64) -> Self {
        Self {
            roads,
            speed_kmh,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn roads(&self) -> &RoadNetwork {
        &self.roads
    }

    /// Number of memoized location pairs.
    pub fn cached_pairs(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Shortest road path between two cells, or `None` if disconnected.
    pub fn shortest_path(&self, from: Location, to: Location) -> Option<GridPath> {
        if !self.roads.is_road(from.x, from.y) || !self.roads.is_road(to.x, to.y) {
            return None;
        }
        if from == to {
            return Some(GridPath::new(vec![from]));
        }

        let size = self.roads.size();
        let index = |x: i64, y: i64| y as usize * size + x as usize;
        let heuristic = |x: i64, y: i64| x.abs_diff(to.x) + y.abs_diff(to.y);

        let mut g_score = vec![u64::MAX; size * size];
        let mut came_from: Vec<Option<(i64, i64)>> = vec![None; size * size];
        let mut open = BinaryHeap::new();

        g_score[index(from.x, from.y)] = 0;
        open.push(Reverse((heuristic(from.x, from.y), 0u64, from.x, from.y)));

        while let Some(Reverse((_, g, x, y))) = open.pop() {
            if (x, y) == (to.x, to.y) {
                return Some(self.reconstruct(&came_from, from, to));
            }
            if g > g_score[index(x, y)] {
                continue;
            }
            for (nx, ny) in self.roads.neighbors(x, y) {
                let tentative = g + 1;
                let slot = index(nx, ny);
                if tentative < g_score[slot] {
                    g_score[slot] = tentative;
                    came_from[slot] = Some((x, y));
                    open.push(Reverse((tentative + heuristic(nx, ny), tentative, nx, ny)));
                }
            }
        }

        None
    }

    fn reconstruct(
        &self,
        came_from: &[Option<(i64, i64)>],
        from: Location,
        to: Location,
    ) -> GridPath {
        let size = self.roads.size();
        let mut cells = vec![to];
        let mut current = (to.x, to.y);
        while current != (from.x, from.y) {
            match came_from[current.1 as usize * size + current.0 as usize] {
                Some(prev) => {
                    cells.push(Location { x: prev.0, y: prev.1 });
                    current = prev;
                }
                None => break,
            }
        }
        cells.reverse();
        GridPath::new(cells)
    }

    fn compute(&self, from: Location, to: Location) -> f64 {
        match self.shortest_path(from, to) {
            Some(path) => path.steps() as f64 * 60.0 / self.speed_kmh,
            None => f64::INFINITY,
        }
    }
}

impl TravelTimeProvider for GridRouter {
    fn travel_time(&self, from: Location, to: Location) -> f64 {
        if from == to {
            return 0.0;
        }
        // Paths are undirected, so both directions share one entry.
        let key = if from <= to { (from, to) } else { (to, from) };

        if let Ok(cache) = self.cache.read() {
            if let Some(&minutes) = cache.get(&key) {
                return minutes;
            }
        }

        let minutes = self.compute(key.0, key.1);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, minutes);
        }
        minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::busyville_roads;

    fn two_islands() -> Arc<RoadNetwork> {
        // Row y = 0 is one road, row y = 4 another, never connected.
        let mut roads = RoadNetwork::empty(5);
        for x in 0..5 {
            roads.set_road(x, 0, true);
            roads.set_road(x, 4, true);
        }
        Arc::new(roads)
    }

    #[test]
    fn test_same_location_is_zero() {
        let router = GridRouter::new(Arc::new(busyville_roads(100)), 30.0);
        let a = Location { x: 10, y: 10 };
        assert_eq!(router.travel_time(a, a), 0.0);
    }

    #[test]
    fn test_straight_road() {
        let router = GridRouter::new(Arc::new(busyville_roads(100)), 30.0);
        // 20 cells along y = 0 at 30 km/h.
        let minutes = router.travel_time(Location { x: 0, y: 0 }, Location { x: 20, y: 0 });
        assert_eq!(minutes, 40.0);
    }

    #[test]
    fn test_grid_path_equals_manhattan_on_main_roads() {
        let router = GridRouter::new(Arc::new(busyville_roads(100)), 30.0);
        let path = router
            .shortest_path(Location { x: 0, y: 0 }, Location { x: 30, y: 20 })
            .expect("connected");
        assert_eq!(path.steps(), 50);
        assert_eq!(path.origin(), Some(&Location { x: 0, y: 0 }));
        assert_eq!(path.destination(), Some(&Location { x: 30, y: 20 }));
    }

    #[test]
    fn test_symmetric_and_memoized() {
        let router = GridRouter::new(Arc::new(busyville_roads(100)), 30.0);
        let a = Location { x: 0, y: 0 };
        let b = Location { x: 50, y: 70 };
        let forward = router.travel_time(a, b);
        assert_eq!(router.cached_pairs(), 1);
        assert_eq!(router.travel_time(b, a), forward);
        assert_eq!(router.cached_pairs(), 1);
    }

    #[test]
    fn test_disconnected_is_infinite() {
        let router = GridRouter::new(two_islands(), 30.0);
        let minutes = router.travel_time(Location { x: 0, y: 0 }, Location { x: 3, y: 4 });
        assert!(minutes.is_infinite());
        assert_eq!(router.travel_minutes(Location { x: 0, y: 0 }, Location { x: 3, y: 4 }), None);
    }

    #[test]
    fn test_detour_around_missing_road() {
        // U-shaped road: (0,0)->(0,2)->(2,2)->(2,0); no direct link along y = 0.
        let mut roads = RoadNetwork::empty(3);
        for i in 0..3 {
            roads.set_road(0, i, true);
            roads.set_road(2, i, true);
            roads.set_road(i, 2, true);
        }
        let router = GridRouter::new(Arc::new(roads), 60.0);
        let path = router
            .shortest_path(Location { x: 0, y: 0 }, Location { x: 2, y: 0 })
            .expect("connected");
        assert_eq!(path.steps(), 6);
        assert_eq!(router.travel_time(Location { x: 0, y: 0 }, Location { x: 2, y: 0 }), 6.0);
    }
}
