//! Local search: swap, relocate and timing neighborhoods.
//!
//! Only strict improvements of [`Schedule::score`] are kept. A rejected trial
//! is rolled back through the ledger's inverse operations, leaving the
//! schedule exactly as it was.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::contractor::ContractorId;
use crate::error::SchedulerError;
use crate::schedule::{Assignment, Schedule};

/// Minimum score gain accepted as an improvement.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchStats {
    pub passes: usize,
    pub swaps: usize,
    pub relocations: usize,
    pub retimings: usize,
    pub timed_out: bool,
}

impl SearchStats {
    pub fn moves(&self) -> usize {
        self.swaps + self.relocations + self.retimings
    }
}

/// Improve `schedule` until a full pass finds nothing or `budget` elapses.
///
/// The clock is polled between neighborhood scans; a scoring pass in flight
/// is never interrupted.
pub fn local_search(schedule: &mut Schedule, budget: Duration) -> Result<SearchStats, SchedulerError> {
    let deadline = Instant::now() + budget;
    let mut stats = SearchStats::default();

    loop {
        if Instant::now() >= deadline {
            stats.timed_out = true;
            break;
        }
        stats.passes += 1;

        let swaps = swap_pass(schedule, deadline)?;
        let relocations = relocate_pass(schedule, deadline)?;
        let retimings = timing_pass(schedule, deadline)?;
        stats.swaps += swaps;
        stats.relocations += relocations;
        stats.retimings += retimings;

        if swaps + relocations + retimings == 0 {
            break;
        }
    }

    debug!(
        passes = stats.passes,
        moves = stats.moves(),
        score = schedule.score(),
        "local search finished"
    );
    Ok(stats)
}

fn still_assigned(schedule: &Schedule, day: usize, assignment: &Assignment) -> bool {
    schedule.assignments(day).contains(assignment)
}

/// Put `errand` on `(contractor, day)`, preferring `preferred` as start time.
fn place_near(
    schedule: &mut Schedule,
    errand: Assignment,
    contractor: ContractorId,
    day: usize,
    preferred: u32,
) -> Option<(usize, Assignment)> {
    let minutes = errand.minutes;
    let start = if schedule
        .can_assign_portion(contractor, errand.errand, day, preferred, minutes)
        .is_ok()
    {
        preferred
    } else {
        schedule
            .candidate_starts(contractor, errand.errand, day, minutes)
            .into_iter()
            .find(|&s| {
                schedule
                    .can_assign_portion(contractor, errand.errand, day, s, minutes)
                    .is_ok()
            })?
    };
    schedule
        .assign_portion(contractor, errand.errand, day, start, minutes)
        .ok()
        .map(|a| (day, a))
}

/// Order two assignments so a predecessor is re-inserted before its dependent.
fn predecessor_first(
    schedule: &Schedule,
    first: (usize, Assignment),
    second: (usize, Assignment),
) -> [(usize, Assignment); 2] {
    if schedule
        .errand(first.1.errand)
        .predecessors()
        .contains(&second.1.errand)
    {
        [second, first]
    } else {
        [first, second]
    }
}

fn rollback(
    schedule: &mut Schedule,
    placed: &[(usize, Assignment)],
    original: &[(usize, Assignment)],
) -> Result<(), SchedulerError> {
    for (day, a) in placed {
        schedule.remove_assignment(*day, a);
    }
    schedule.restore(original)
}

// ============================================================================
// Swap
// ============================================================================

/// Exchange the contractor/day slots of two assignments.
///
/// Same-day pairs are scanned first, then pairs from different days.
fn swap_pass(schedule: &mut Schedule, deadline: Instant) -> Result<usize, SchedulerError> {
    let all = schedule.all_assignments();
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for i in 0..all.len() {
        for j in i + 1..all.len() {
            if all[i].0 == all[j].0 {
                pairs.push((i, j));
            }
        }
    }
    for i in 0..all.len() {
        for j in i + 1..all.len() {
            if all[i].0 != all[j].0 {
                pairs.push((i, j));
            }
        }
    }

    let mut accepted = 0;
    for (i, j) in pairs {
        if Instant::now() >= deadline {
            break;
        }
        let (a, b) = (all[i], all[j]);
        if a.1.errand == b.1.errand || (a.0 == b.0 && a.1.contractor == b.1.contractor) {
            continue;
        }
        if !still_assigned(schedule, a.0, &a.1) || !still_assigned(schedule, b.0, &b.1) {
            continue;
        }
        if try_swap(schedule, a, b)? {
            accepted += 1;
        }
    }
    Ok(accepted)
}

fn try_swap(
    schedule: &mut Schedule,
    a: (usize, Assignment),
    b: (usize, Assignment),
) -> Result<bool, SchedulerError> {
    let before = schedule.score();
    schedule.remove_assignment(a.0, &a.1);
    schedule.remove_assignment(b.0, &b.1);

    // a takes b's slot and vice versa.
    let targets = predecessor_first(schedule, (b.0, a.1), (a.0, b.1));
    let mut placed = Vec::with_capacity(2);
    for (day, moving) in targets {
        let slot_owner = if moving.errand == a.1.errand { b.1 } else { a.1 };
        match place_near(schedule, moving, slot_owner.contractor, day, slot_owner.start) {
            Some(p) => placed.push(p),
            None => break,
        }
    }

    if placed.len() == 2 && schedule.score() > before + EPSILON {
        return Ok(true);
    }
    let original = predecessor_first(schedule, a, b);
    rollback(schedule, &placed, &original)?;
    Ok(false)
}

// ============================================================================
// Relocate
// ============================================================================

/// Move single assignments to the best slot over all days and contractors.
fn relocate_pass(schedule: &mut Schedule, deadline: Instant) -> Result<usize, SchedulerError> {
    let mut accepted = 0;
    for (day, a) in schedule.all_assignments() {
        if Instant::now() >= deadline {
            break;
        }
        if !still_assigned(schedule, day, &a) {
            continue;
        }
        if try_relocate(schedule, day, a)? {
            accepted += 1;
        }
    }
    Ok(accepted)
}

fn try_relocate(schedule: &mut Schedule, day: usize, a: Assignment) -> Result<bool, SchedulerError> {
    let before = schedule.score();
    schedule.remove_assignment(day, &a);
    let current = schedule.insertion_score(a.contractor, a.errand, day, a.start, a.minutes);

    let mut best: Option<(ContractorId, usize, u32, f64)> = None;
    let contractors: Vec<ContractorId> = schedule.contractors().iter().map(|c| c.id()).collect();
    for target_day in 0..schedule.horizon_days() {
        for &contractor in &contractors {
            for start in schedule.candidate_starts(contractor, a.errand, target_day, a.minutes) {
                if (contractor, target_day, start) == (a.contractor, day, a.start) {
                    continue;
                }
                if schedule
                    .can_assign_portion(contractor, a.errand, target_day, start, a.minutes)
                    .is_err()
                {
                    continue;
                }
                let score = schedule.insertion_score(contractor, a.errand, target_day, start, a.minutes);
                if best.is_none_or(|(_, _, _, s)| score > s) {
                    best = Some((contractor, target_day, start, score));
                }
            }
        }
    }

    if let Some((contractor, target_day, start, score)) = best {
        if score > current + EPSILON {
            if let Ok(moved) = schedule.assign_portion(contractor, a.errand, target_day, start, a.minutes) {
                if schedule.score() > before + EPSILON {
                    return Ok(true);
                }
                schedule.remove_assignment(target_day, &moved);
            }
        }
    }
    schedule.restore(&[(day, a)])?;
    Ok(false)
}

// ============================================================================
// Timing
// ============================================================================

/// Shift start times within a bounded window, keeping day and contractor.
fn timing_pass(schedule: &mut Schedule, deadline: Instant) -> Result<usize, SchedulerError> {
    let mut accepted = 0;
    for (day, a) in schedule.all_assignments() {
        if Instant::now() >= deadline {
            break;
        }
        if !still_assigned(schedule, day, &a) {
            continue;
        }
        if try_retime(schedule, day, a)? {
            accepted += 1;
        }
    }
    Ok(accepted)
}

fn try_retime(schedule: &mut Schedule, day: usize, a: Assignment) -> Result<bool, SchedulerError> {
    let step = schedule.config().time_step.max(1);
    let window = schedule.config().timing_window;

    let before = schedule.score();
    schedule.remove_assignment(day, &a);
    let current = schedule.insertion_score(a.contractor, a.errand, day, a.start, a.minutes);

    let mut best: Option<(u32, f64)> = None;
    let mut offset = step;
    while offset <= window {
        for start in [a.start.checked_sub(offset), a.start.checked_add(offset)]
            .into_iter()
            .flatten()
        {
            if schedule
                .can_assign_portion(a.contractor, a.errand, day, start, a.minutes)
                .is_err()
            {
                continue;
            }
            let score = schedule.insertion_score(a.contractor, a.errand, day, start, a.minutes);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((start, score));
            }
        }
        offset += step;
    }

    if let Some((start, score)) = best {
        if score > current + EPSILON {
            if let Ok(moved) = schedule.assign_portion(a.contractor, a.errand, day, start, a.minutes) {
                if schedule.score() > before + EPSILON {
                    return Ok(true);
                }
                schedule.remove_assignment(day, &moved);
            }
        }
    }
    schedule.restore(&[(day, a)])?;
    Ok(false)
}
