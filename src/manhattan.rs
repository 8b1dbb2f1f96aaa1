//! Manhattan travel estimate (fallback when road routing is not wanted).
//!
//! Uses grid distance and an assumed speed. Ignores the road layout, so it is
//! never infinite, but it is cheap and predictable.

use crate::grid::Location;
use crate::traits::TravelTimeProvider;

/// Average speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 30.0;

/// Manhattan-distance travel estimate.
///
/// One grid cell is one kilometre.
#[derive(Debug, Clone)]
pub struct ManhattanEstimate {
    /// Assumed average speed in km/h.
    pub speed_kmh: f64,
}

impl Default for ManhattanEstimate {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl ManhattanEstimate {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }
}

impl TravelTimeProvider for ManhattanEstimate {
    fn travel_time(&self, from: Location, to: Location) -> f64 {
        from.manhattan_distance(&to) as f64 * 60.0 / self.speed_kmh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let a = Location { x: 4, y: 9 };
        assert_eq!(ManhattanEstimate::default().travel_time(a, a), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let estimate = ManhattanEstimate::default();
        let a = Location { x: 1, y: 2 };
        let b = Location { x: 7, y: 0 };
        assert_eq!(estimate.travel_time(a, b), estimate.travel_time(b, a));
    }

    #[test]
    fn test_reasonable_travel_time() {
        // 10 cells at 30 km/h = 20 minutes.
        let estimate = ManhattanEstimate::new(30.0);
        let minutes = estimate.travel_time(Location { x: 0, y: 0 }, Location { x: 6, y: 4 });
        assert!((minutes - 20.0).abs() < 1e-9);
        assert_eq!(
            estimate.travel_minutes(Location { x: 0, y: 0 }, Location { x: 6, y: 4 }),
            Some(20)
        );
    }
}
