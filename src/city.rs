//! Synthetic city ("Busyville") and its road network.
//!
//! The city is a square grid split into zones. Main roads run every 10 cells in
//! both directions; residential and commercial zones get secondary roads every
//! 5 cells.

use crate::grid::{Location, RoadNetwork};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaType {
    Residential,
    Commercial,
    Park,
    Industrial,
}

#[derive(Debug, Clone)]
pub struct CityMap {
    size: usize,
    areas: Vec<AreaType>,
}

impl CityMap {
    /// The default zoning, scaled to `size` (designed for 100).
    pub fn busyville(size: usize) -> Self {
        let mut map = Self {
            size,
            areas: vec![AreaType::Residential; size * size],
        };
        let scale = |v: usize| v * size / 100;

        // Rows are y, columns are x.
        map.fill(scale(10)..scale(30), scale(10)..scale(30), AreaType::Commercial);
        map.fill(scale(60)..scale(90), scale(60)..scale(90), AreaType::Industrial);
        map.fill(scale(10)..scale(40), scale(60)..scale(90), AreaType::Residential);
        map.fill(scale(60)..scale(90), scale(10)..scale(40), AreaType::Residential);
        map.fill(scale(40)..scale(60), scale(40)..scale(60), AreaType::Park);
        map
    }

    fn fill(
        &mut self,
        rows: std::ops::Range<usize>,
        cols: std::ops::Range<usize>,
        area: AreaType,
    ) {
        for y in rows {
            for x in cols.clone() {
                self.areas[y * self.size + x] = area;
            }
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn area_at(&self, x: usize, y: usize) -> Option<AreaType> {
        (x < self.size && y < self.size).then(|| self.areas[y * self.size + x])
    }

    pub fn area_type(&self, location: &Location) -> Option<AreaType> {
        if location.x < 0 || location.y < 0 {
            return None;
        }
        self.area_at(location.x as usize, location.y as usize)
    }

    /// Derive the road network for this zoning.
    pub fn road_network(&self) -> RoadNetwork {
        let mut roads = RoadNetwork::empty(self.size);
        for y in 0..self.size {
            for x in 0..self.size {
                let main = x % 10 == 0 || y % 10 == 0;
                let secondary = matches!(
                    self.areas[y * self.size + x],
                    AreaType::Residential | AreaType::Commercial
                ) && (x % 5 == 0 || y % 5 == 0);
                if main || secondary {
                    roads.set_road(x, y, true);
                }
            }
        }
        roads
    }
}

/// Road network of the default 100x100 city.
pub fn busyville_roads(size: usize) -> RoadNetwork {
    CityMap::busyville(size).road_network()
}
