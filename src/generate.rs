//! Random problem instances on a road grid.

use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::contractor::{Contractor, ContractorId};
use crate::errand::{Errand, ErrandId};
use crate::error::SchedulerError;
use crate::grid::{Location, RoadNetwork};
use crate::schedule::Schedule;
use crate::traits::TravelTimeProvider;

/// A uniformly random cell of `roads`, snapped onto the nearest road.
pub fn random_location<R: Rng + ?Sized>(roads: &RoadNetwork, rng: &mut R) -> Result<Location, SchedulerError> {
    let size = roads.size() as i64;
    if size == 0 {
        return Err(SchedulerError::NoRoads);
    }
    Location::snapped(rng.gen_range(0..size), rng.gen_range(0..size), roads)
}

/// Build a random problem of `num_errands` errands and `num_contractors`
/// contractors.
///
/// Errand types are drawn from the catalog. Errands that need someone at home
/// get a time window inside work hours, at least twice their duration wide.
/// Request ages are drawn from `0..=horizon_days / 2`.
pub fn generate_problem<R: Rng + ?Sized>(
    config: Arc<SchedulerConfig>,
    roads: &RoadNetwork,
    travel: Arc<dyn TravelTimeProvider>,
    num_errands: usize,
    num_contractors: usize,
    rng: &mut R,
) -> Result<Schedule, SchedulerError> {
    let kinds: Vec<String> = config.catalog.names().map(str::to_string).collect();
    if kinds.is_empty() && num_errands > 0 {
        return Err(SchedulerError::InvalidConfig("errand catalog is empty".to_string()));
    }
    let max_age = (config.horizon_days / 2) as u32;

    let mut errands = Vec::with_capacity(num_errands);
    for id in 0..num_errands {
        let Some(kind) = kinds.choose(rng) else {
            break;
        };
        let location = random_location(roads, rng)?;
        let mut errand = Errand::new(ErrandId(id), kind, location, &config.catalog, config.sla_days)?
            .with_days_since_request(rng.gen_range(0..=max_age));

        if errand.home_required() {
            let width = (errand.duration() * 2).min(config.work_day_minutes());
            let latest = config.work_end - width;
            let start = config.work_start
                + config.time_step * rng.gen_range(0..=(latest - config.work_start) / config.time_step.max(1));
            errand = errand.with_window(start, start + width);
        }
        errands.push(errand);
    }

    let contractors = (0..num_contractors)
        .map(|id| {
            random_location(roads, rng)
                .map(|start| Contractor::new(ContractorId(id), start, config.horizon_days))
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(errands = errands.len(), contractors = contractors.len(), "generated problem");
    Schedule::new(config, travel, contractors, errands)
}
