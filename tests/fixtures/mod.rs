//! Test fixtures for errand-planner.
//!
//! Provides:
//! - Named Busyville spots that sit on roads
//! - Builders for errands and whole problems

#![allow(dead_code)]

pub mod busyville_locations;

use std::sync::{Arc, OnceLock};

use errand_planner::city::busyville_roads;
use errand_planner::config::SchedulerConfig;
use errand_planner::contractor::{Contractor, ContractorId};
use errand_planner::errand::{Errand, ErrandId};
use errand_planner::grid::{Location, RoadNetwork};
use errand_planner::manhattan::ManhattanEstimate;
use errand_planner::router::GridRouter;
use errand_planner::schedule::Schedule;
use errand_planner::traits::TravelTimeProvider;

pub use busyville_locations::*;

pub fn loc(x: i64, y: i64) -> Location {
    Location { x, y }
}

/// Shared default road network.
pub fn busyville() -> Arc<RoadNetwork> {
    static ROADS: OnceLock<Arc<RoadNetwork>> = OnceLock::new();
    ROADS.get_or_init(|| Arc::new(busyville_roads(100))).clone()
}

pub fn busyville_router() -> Arc<GridRouter> {
    Arc::new(GridRouter::new(busyville(), 30.0))
}

/// Builder for test errands with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestErrand {
    kind: &'static str,
    location: (i64, i64),
    window: Option<(u32, u32)>,
    days_since_request: u32,
    predecessors: Vec<usize>,
    sla_days: Option<u32>,
}

impl TestErrand {
    pub fn new(kind: &'static str, location: (i64, i64)) -> Self {
        Self {
            kind,
            location,
            window: None,
            days_since_request: 0,
            predecessors: Vec::new(),
            sla_days: None,
        }
    }

    pub fn with_window(mut self, start: u32, end: u32) -> Self {
        self.window = Some((start, end));
        self
    }

    pub fn requested_days_ago(mut self, days: u32) -> Self {
        self.days_since_request = days;
        self
    }

    pub fn after(mut self, predecessor: usize) -> Self {
        self.predecessors.push(predecessor);
        self
    }

    pub fn with_sla_days(mut self, days: u32) -> Self {
        self.sla_days = Some(days);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Travel {
    Manhattan,
    Roads,
}

/// Builder for whole problems.
#[derive(Clone, Debug)]
pub struct ProblemBuilder {
    config: SchedulerConfig,
    errands: Vec<TestErrand>,
    contractors: Vec<(i64, i64)>,
    travel: Travel,
}

impl Default for ProblemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProblemBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            errands: Vec::new(),
            contractors: Vec::new(),
            travel: Travel::Manhattan,
        }
    }

    pub fn horizon(mut self, days: usize) -> Self {
        self.config.horizon_days = days;
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut SchedulerConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn on_roads(mut self) -> Self {
        self.travel = Travel::Roads;
        self
    }

    pub fn errand(mut self, errand: TestErrand) -> Self {
        self.errands.push(errand);
        self
    }

    pub fn contractor(mut self, start: (i64, i64)) -> Self {
        self.contractors.push(start);
        self
    }

    pub fn build(self) -> Schedule {
        let config = Arc::new(self.config);
        let travel: Arc<dyn TravelTimeProvider> = match self.travel {
            Travel::Manhattan => Arc::new(ManhattanEstimate::new(config.speed_kmh)),
            Travel::Roads => busyville_router(),
        };
        let errands = self
            .errands
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut errand = Errand::new(
                    ErrandId(i),
                    t.kind,
                    loc(t.location.0, t.location.1),
                    &config.catalog,
                    t.sla_days.unwrap_or(config.sla_days),
                )
                .expect("known errand type")
                .with_days_since_request(t.days_since_request);
                if let Some((start, end)) = t.window {
                    errand = errand.with_window(start, end);
                }
                for &p in &t.predecessors {
                    errand = errand.with_predecessor(ErrandId(p));
                }
                errand
            })
            .collect();
        let contractors = self
            .contractors
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Contractor::new(ContractorId(i), loc(x, y), config.horizon_days))
            .collect();
        Schedule::new(config, travel, contractors, errands).expect("valid problem")
    }
}

/// Assert that no contractor has two stops closer than the travel between them.
pub fn assert_no_overlaps(schedule: &Schedule) {
    for c in schedule.contractors() {
        for day in 0..schedule.horizon_days() {
            let mut from = c.start_location();
            let mut ready = schedule.config().work_start;
            for stop in c.route(day) {
                let leg = schedule
                    .travel_minutes(from, stop.location)
                    .expect("reachable stop");
                assert!(
                    ready + leg <= stop.start,
                    "{} on day {}: {} starts at {} but cannot arrive before {}",
                    c.id(),
                    day,
                    stop.errand,
                    stop.start,
                    ready + leg
                );
                from = stop.location;
                ready = stop.end();
            }
        }
    }
}
