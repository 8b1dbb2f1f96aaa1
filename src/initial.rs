//! Greedy construction of a first schedule.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::contractor::ContractorId;
use crate::errand::ErrandId;
use crate::schedule::Schedule;

/// Figures reported after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialStats {
    pub assigned_errands: usize,
    pub total_errands: usize,
    pub total_profit: f64,
    pub sla_compliance: f64,
    pub resource_utilization: f64,
}

impl InitialStats {
    pub fn of(schedule: &Schedule) -> Self {
        Self {
            assigned_errands: schedule.completed().len(),
            total_errands: schedule.errands().len(),
            total_profit: schedule.total_profit(),
            sla_compliance: schedule.calculate_sla_compliance(),
            resource_utilization: schedule.calculate_resource_utilization(),
        }
    }
}

/// Fill `schedule` greedily, day by day.
///
/// Errands go by priority, then by duration, both descending. On each day the
/// least busy contractors are served first and keep taking the next errand
/// that fits. Long errands that cannot finish before work end are split, the
/// rest carried to a later day. Whatever is left is forced onto the final day,
/// within the configured overflow.
pub fn build_initial_solution(schedule: &mut Schedule) -> InitialStats {
    info!(errands = schedule.errands().len(), "generating initial solution");

    let mut pending: Vec<ErrandId> = schedule.unassigned().iter().copied().collect();
    pending.sort_by_key(|&e| {
        let errand = schedule.errand(e);
        (std::cmp::Reverse(errand.priority()), std::cmp::Reverse(errand.remaining()), e)
    });

    for day in 0..schedule.horizon_days() {
        if pending.is_empty() {
            break;
        }
        let mut order: Vec<ContractorId> = schedule.contractors().iter().map(|c| c.id()).collect();
        order.sort_by_key(|&c| (schedule.contractor(c).workload(), c));

        for contractor in order {
            fill_contractor_day(schedule, contractor, day, &mut pending);
            if pending.is_empty() {
                break;
            }
        }
    }

    if !pending.is_empty() {
        force_place_on_last_day(schedule, &mut pending);
    }
    for errand in &pending {
        warn!(%errand, "failed to assign errand");
    }

    let stats = InitialStats::of(schedule);
    info!(
        assigned = stats.assigned_errands,
        total = stats.total_errands,
        profit = stats.total_profit,
        "initial solution generated"
    );
    stats
}

fn fill_contractor_day(
    schedule: &mut Schedule,
    contractor: ContractorId,
    day: usize,
    pending: &mut Vec<ErrandId>,
) {
    let work_end = schedule.config().work_end;
    let mut current = schedule
        .contractor(contractor)
        .end_time(day)
        .unwrap_or(schedule.config().work_start);

    while current < work_end && !pending.is_empty() {
        let mut placed = false;

        for index in 0..pending.len() {
            let errand = pending[index];
            let e = schedule.errand(errand);
            let from = schedule.contractor(contractor).current_location(day);
            let Some(travel) = schedule.travel_minutes(from, e.location()) else {
                continue;
            };
            let window_start = e.window().map(|(start, _)| start).unwrap_or(0);
            let arrival = (current + travel).max(window_start);
            let remaining = e.remaining();

            if schedule
                .contractor(contractor)
                .can_fit(e, arrival - travel, travel, schedule.config())
            {
                if schedule.assign_errand(contractor, errand, day, arrival).is_ok() {
                    debug!(%errand, %contractor, day, "assigned errand");
                    pending.remove(index);
                    current = arrival + remaining;
                    placed = true;
                    break;
                }
            } else if arrival < work_end && splittable(schedule, errand, work_end - arrival) {
                let portion = work_end - arrival;
                if schedule
                    .assign_portion(contractor, errand, day, arrival, portion)
                    .is_ok()
                {
                    debug!(%errand, %contractor, day, portion, "partially assigned errand");
                    current = work_end;
                    placed = true;
                    break;
                }
            }
        }

        if !placed {
            break;
        }
    }
}

fn splittable(schedule: &Schedule, errand: ErrandId, portion: u32) -> bool {
    let config = schedule.config();
    let e = schedule.errand(errand);
    e.duration() >= config.split_min_duration
        && portion >= config.min_split_minutes
        && portion < e.remaining()
}

fn force_place_on_last_day(schedule: &mut Schedule, pending: &mut Vec<ErrandId>) {
    let last_day = schedule.config().last_day();
    let contractors: Vec<ContractorId> = schedule.contractors().iter().map(|c| c.id()).collect();

    for contractor in contractors {
        pending.retain(|&errand| {
            let Some(start) = schedule.earliest_feasible_start(contractor, errand, last_day) else {
                return true;
            };
            match schedule.assign_errand(contractor, errand, last_day, start) {
                Ok(_) => {
                    info!(%errand, %contractor, "assigned remaining errand on last day");
                    false
                }
                Err(_) => true,
            }
        });
    }
}
