//! Contractors and their per-day routes.

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::errand::{Errand, ErrandId};
use crate::grid::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractorId(pub usize);

impl std::fmt::Display for ContractorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// One committed visit on a contractor's day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stop {
    pub errand: ErrandId,
    pub location: Location,
    pub start: u32,
    pub minutes: u32,
}

impl Stop {
    pub fn end(&self) -> u32 {
        self.start + self.minutes
    }
}

/// A mobile agent with one route per horizon day.
///
/// There is no settable "current location": the departure point for the next
/// leg is always the location of the latest committed stop of that day.
#[derive(Debug, Clone, PartialEq)]
pub struct Contractor {
    id: ContractorId,
    start_location: Location,
    routes: Vec<Vec<Stop>>,
}

impl Contractor {
    pub fn new(id: ContractorId, start_location: Location, horizon_days: usize) -> Self {
        Self {
            id,
            start_location,
            routes: vec![Vec::new(); horizon_days],
        }
    }

    pub fn id(&self) -> ContractorId {
        self.id
    }

    pub fn start_location(&self) -> Location {
        self.start_location
    }

    /// Stops of `day`, ordered by start time.
    pub fn route(&self, day: usize) -> &[Stop] {
        self.routes.get(day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn days(&self) -> usize {
        self.routes.len()
    }

    /// Location of the last committed stop of `day`, or the start location.
    pub fn current_location(&self, day: usize) -> Location {
        self.route(day)
            .last()
            .map(|stop| stop.location)
            .unwrap_or(self.start_location)
    }

    /// End of the last committed stop of `day`.
    pub fn end_time(&self, day: usize) -> Option<u32> {
        self.route(day).last().map(Stop::end)
    }

    /// Stops immediately before and after `start` on `day`.
    pub fn neighbors_at(&self, day: usize, start: u32) -> (Option<&Stop>, Option<&Stop>) {
        let route = self.route(day);
        let split = route.partition_point(|stop| stop.start < start);
        let prev = split.checked_sub(1).map(|i| &route[i]);
        (prev, route.get(split))
    }

    /// Whether the remaining service time of `errand`, started after
    /// `travel_time` of driving from `current_time`, ends by the configured
    /// work end.
    pub fn can_fit(&self, errand: &Errand, current_time: u32, travel_time: u32, config: &SchedulerConfig) -> bool {
        current_time + travel_time + errand.remaining() <= config.work_end
    }

    /// Insert a stop into the day's route, keeping it ordered by start.
    pub fn commit(&mut self, day: usize, stop: Stop) {
        if day >= self.routes.len() {
            self.routes.resize(day + 1, Vec::new());
        }
        let route = &mut self.routes[day];
        let position = route.partition_point(|s| s.start <= stop.start);
        route.insert(position, stop);
    }

    /// Remove the stop of `errand` starting at `start`; returns it if present.
    pub fn uncommit(&mut self, day: usize, errand: ErrandId, start: u32) -> Option<Stop> {
        let route = self.routes.get_mut(day)?;
        let position = route
            .iter()
            .position(|stop| stop.errand == errand && stop.start == start)?;
        Some(route.remove(position))
    }

    /// Booked service minutes over the whole horizon.
    pub fn workload(&self) -> u32 {
        self.routes.iter().flatten().map(|stop| stop.minutes).sum()
    }

    /// Booked service minutes on `day`.
    pub fn booked_minutes(&self, day: usize) -> u32 {
        self.route(day).iter().map(|stop| stop.minutes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(errand: usize, start: u32, minutes: u32) -> Stop {
        Stop {
            errand: ErrandId(errand),
            location: Location { x: errand as i64, y: 0 },
            start,
            minutes,
        }
    }

    #[test]
    fn test_commit_keeps_route_ordered() {
        let mut contractor = Contractor::new(ContractorId(0), Location { x: 0, y: 0 }, 2);
        contractor.commit(0, stop(1, 600, 30));
        contractor.commit(0, stop(2, 500, 30));
        let starts: Vec<u32> = contractor.route(0).iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![500, 600]);
    }

    #[test]
    fn test_current_location_follows_last_stop() {
        let mut contractor = Contractor::new(ContractorId(0), Location { x: 0, y: 0 }, 2);
        assert_eq!(contractor.current_location(0), Location { x: 0, y: 0 });
        contractor.commit(0, stop(3, 500, 30));
        assert_eq!(contractor.current_location(0), Location { x: 3, y: 0 });
        // Other days are unaffected.
        assert_eq!(contractor.current_location(1), Location { x: 0, y: 0 });
        contractor.uncommit(0, ErrandId(3), 500);
        assert_eq!(contractor.current_location(0), Location { x: 0, y: 0 });
    }

    #[test]
    fn test_neighbors_at() {
        let mut contractor = Contractor::new(ContractorId(0), Location { x: 0, y: 0 }, 1);
        contractor.commit(0, stop(1, 500, 30));
        contractor.commit(0, stop(2, 700, 30));
        let (prev, next) = contractor.neighbors_at(0, 600);
        assert_eq!(prev.map(|s| s.errand), Some(ErrandId(1)));
        assert_eq!(next.map(|s| s.errand), Some(ErrandId(2)));
        let (prev, next) = contractor.neighbors_at(0, 400);
        assert!(prev.is_none());
        assert_eq!(next.map(|s| s.errand), Some(ErrandId(1)));
    }

    #[test]
    fn test_can_fit() {
        let config = SchedulerConfig::default();
        let contractor = Contractor::new(ContractorId(0), Location { x: 0, y: 0 }, 1);
        let walk = Errand::new(ErrandId(0), "Dog Walk", Location { x: 4, y: 0 }, &config.catalog, 10).unwrap();
        assert!(contractor.can_fit(&walk, 900, 60, &config));
        assert!(!contractor.can_fit(&walk, 900, 61, &config));
    }

    #[test]
    fn test_workload() {
        let mut contractor = Contractor::new(ContractorId(0), Location { x: 0, y: 0 }, 2);
        contractor.commit(0, stop(1, 500, 30));
        contractor.commit(1, stop(2, 500, 90));
        assert_eq!(contractor.workload(), 120);
        assert_eq!(contractor.booked_minutes(1), 90);
    }
}
