//! Diversification strategies used between local search rounds.

use std::cmp::Reverse;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::contractor::ContractorId;
use crate::errand::ErrandId;
use crate::schedule::{Assignment, Schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Drop a random fraction of assignments and reinsert them greedily.
    RandomRemoval,
    /// Move a contiguous block of one day to other days or contractors.
    BlockRelocation,
    /// Re-draw start times of errands that carry a time window.
    TimeWindowShift,
    /// Rebuild everything in priority, then profit-density, order.
    PriorityReschedule,
    /// Hand an errand to another contractor on the same day, then continue
    /// with one of that contractor's errands.
    ChainReassignment,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::RandomRemoval,
        Strategy::BlockRelocation,
        Strategy::TimeWindowShift,
        Strategy::PriorityReschedule,
        Strategy::ChainReassignment,
    ];

    pub fn choose<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Hand-overs attempted by one chain reassignment.
const CHAIN_LENGTH: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerturbationStats {
    pub removed: usize,
    pub reinserted: usize,
    pub unassigned_after: usize,
}

/// Perturbation strength for search progress in `[0, 1]`.
///
/// Decays quadratically from `max` at the start to `min` at the end.
pub fn perturbation_strength(progress: f64, min: f64, max: f64) -> f64 {
    let remaining = 1.0 - progress.clamp(0.0, 1.0);
    min + (max - min) * remaining * remaining
}

/// Apply `strategy` at `strength`, then try to place every unassigned errand.
pub fn perturb<R: Rng + ?Sized>(
    schedule: &mut Schedule,
    strategy: Strategy,
    strength: f64,
    rng: &mut R,
) -> PerturbationStats {
    let strength = strength.clamp(0.0, 1.0);
    let mut stats = match strategy {
        Strategy::RandomRemoval => random_removal(schedule, strength, rng),
        Strategy::BlockRelocation => block_relocation(schedule, strength, rng),
        Strategy::TimeWindowShift => time_window_shift(schedule, strength, rng),
        Strategy::PriorityReschedule => priority_reschedule(schedule),
        Strategy::ChainReassignment => chain_reassignment(schedule, CHAIN_LENGTH, rng),
    };
    stats.reinserted += reinsert_unassigned(schedule);
    stats.unassigned_after = schedule.unassigned().len();

    debug!(?strategy, strength, removed = stats.removed, reinserted = stats.reinserted, "perturbed");
    stats
}

fn distinct_errands(removed: &[(usize, Assignment)]) -> Vec<ErrandId> {
    let mut errands: Vec<ErrandId> = Vec::with_capacity(removed.len());
    for (_, a) in removed {
        if !errands.contains(&a.errand) {
            errands.push(a.errand);
        }
    }
    errands
}

fn random_removal<R: Rng + ?Sized>(schedule: &mut Schedule, strength: f64, rng: &mut R) -> PerturbationStats {
    let all = schedule.all_assignments();
    let count = (all.len() as f64 * strength) as usize;
    let chosen: Vec<(usize, Assignment)> = all.choose_multiple(rng, count).copied().collect();

    for (day, a) in &chosen {
        schedule.remove_assignment(*day, a);
    }
    let reinserted = distinct_errands(&chosen)
        .into_iter()
        .filter(|&e| schedule.insert_best(e).is_some())
        .count();

    PerturbationStats {
        removed: chosen.len(),
        reinserted,
        ..PerturbationStats::default()
    }
}

fn block_relocation<R: Rng + ?Sized>(schedule: &mut Schedule, strength: f64, rng: &mut R) -> PerturbationStats {
    let busy_days: Vec<usize> = (0..schedule.horizon_days())
        .filter(|&d| !schedule.assignments(d).is_empty())
        .collect();
    let Some(&day) = busy_days.choose(rng) else {
        return PerturbationStats::default();
    };

    let table = schedule.assignments(day).to_vec();
    let len = ((table.len() as f64 * strength).ceil() as usize).clamp(1, table.len());
    let offset = rng.gen_range(0..=table.len() - len);
    let block = &table[offset..offset + len];

    for a in block {
        schedule.remove_assignment(day, a);
    }

    let mut reinserted = 0;
    for a in block {
        if !schedule.unassigned().contains(&a.errand) {
            continue;
        }
        let slot = schedule.best_slot(a.errand, |contractor, d| d != day || contractor != a.contractor);
        if let Some(slot) = slot {
            if schedule
                .assign_errand(slot.contractor, a.errand, slot.day, slot.start)
                .is_ok()
            {
                reinserted += 1;
            }
        }
    }

    PerturbationStats {
        removed: block.len(),
        reinserted,
        ..PerturbationStats::default()
    }
}

fn time_window_shift<R: Rng + ?Sized>(schedule: &mut Schedule, strength: f64, rng: &mut R) -> PerturbationStats {
    let windowed: Vec<(usize, Assignment)> = schedule
        .all_assignments()
        .into_iter()
        .filter(|(_, a)| schedule.errand(a.errand).window().is_some())
        .collect();
    if windowed.is_empty() {
        return PerturbationStats::default();
    }
    let count = ((windowed.len() as f64 * strength).round() as usize).clamp(1, windowed.len());
    let chosen: Vec<(usize, Assignment)> = windowed.choose_multiple(rng, count).copied().collect();

    let step = schedule.config().time_step.max(1);
    let mut reinserted = 0;
    for (day, a) in &chosen {
        schedule.remove_assignment(*day, a);

        let Some((window_start, window_end)) = schedule.errand(a.errand).window() else {
            continue;
        };
        let lo = window_start.max(schedule.config().work_start);
        let hi = window_end.min(schedule.config().day_end_limit(*day));
        if lo + a.minutes > hi {
            continue;
        }
        let slots = (hi - a.minutes - lo) / step;
        let start = lo + step * rng.gen_range(0..=slots);
        if schedule
            .assign_portion(a.contractor, a.errand, *day, start, a.minutes)
            .is_ok()
        {
            reinserted += 1;
        }
    }

    PerturbationStats {
        removed: chosen.len(),
        reinserted,
        ..PerturbationStats::default()
    }
}

fn priority_reschedule(schedule: &mut Schedule) -> PerturbationStats {
    let removed = schedule.clear().len();

    let mut order: Vec<ErrandId> = schedule.unassigned().iter().copied().collect();
    order.sort_by(|&a, &b| {
        let (ea, eb) = (schedule.errand(a), schedule.errand(b));
        let density = |e: &crate::errand::Errand| e.profit_on(0) / e.duration().max(1) as f64;
        Reverse(ea.priority())
            .cmp(&Reverse(eb.priority()))
            .then(density(eb).total_cmp(&density(ea)))
            .then(a.cmp(&b))
    });

    let reinserted = order
        .into_iter()
        .filter(|&e| schedule.insert_best(e).is_some())
        .count();

    PerturbationStats {
        removed,
        reinserted,
        ..PerturbationStats::default()
    }
}

fn chain_reassignment<R: Rng + ?Sized>(schedule: &mut Schedule, length: usize, rng: &mut R) -> PerturbationStats {
    let mut stats = PerturbationStats::default();
    let Some(&(day, mut link)) = schedule.all_assignments().choose(rng) else {
        return stats;
    };

    for _ in 0..length {
        let others: Vec<ContractorId> = schedule
            .contractors()
            .iter()
            .map(|c| c.id())
            .filter(|&c| c != link.contractor)
            .collect();
        let Some(&target) = others.choose(rng) else {
            break;
        };

        schedule.remove_assignment(day, &link);
        stats.removed += 1;
        let moved = schedule
            .candidate_starts(target, link.errand, day, link.minutes)
            .into_iter()
            .find(|&start| {
                schedule
                    .can_assign_portion(target, link.errand, day, start, link.minutes)
                    .is_ok()
            })
            .and_then(|start| {
                schedule
                    .assign_portion(target, link.errand, day, start, link.minutes)
                    .ok()
            });
        match moved {
            Some(moved) => {
                stats.reinserted += 1;
                link = moved;
            }
            None => {
                if let Err(err) = schedule.restore(&[(day, link)]) {
                    debug!(%err, "chain link left unassigned");
                }
            }
        }

        let next: Vec<Assignment> = schedule
            .assignments(day)
            .iter()
            .filter(|a| a.contractor == target && a.errand != link.errand)
            .copied()
            .collect();
        match next.choose(rng) {
            Some(&a) => link = a,
            None => break,
        }
    }
    stats
}

/// Place unassigned errands at their best feasible slot, highest priority
/// first. Sweeps repeat while they make progress, so an errand blocked by a
/// pending predecessor gets another chance.
pub fn reinsert_unassigned(schedule: &mut Schedule) -> usize {
    let mut total = 0;
    loop {
        let mut order: Vec<ErrandId> = schedule.unassigned().iter().copied().collect();
        order.sort_by_key(|&e| (Reverse(schedule.errand(e).priority()), e));

        let placed = order
            .into_iter()
            .filter(|&e| schedule.insert_best(e).is_some())
            .count();
        total += placed;
        if placed == 0 {
            return total;
        }
    }
}
