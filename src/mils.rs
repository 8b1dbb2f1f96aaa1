//! Modified Iterated Local Search driver and the multi-run wrapper.
//!
//! One run constructs a greedy schedule, improves it with a bounded local
//! search and then repeats perturb, search, accept until the iteration or
//! wall-clock budget is spent. Acceptance follows a simulated annealing
//! rule with geometric cooling; a long plateau without a new best raises the
//! temperature again.
//!
//! Every iteration works on a clone of the current schedule. A failed or
//! panicking iteration drops its candidate and the loop carries on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;
use crate::initial::{build_initial_solution, InitialStats};
use crate::local_search::local_search;
use crate::perturbation::{perturb, perturbation_strength, Strategy};
use crate::schedule::Schedule;

/// Result of one driver run.
#[derive(Debug, Clone)]
pub struct MilsOutcome {
    pub best: Schedule,
    pub best_score: f64,
    /// Statistics of the greedy construction.
    pub initial: InitialStats,
    /// Score after construction and the first local search.
    pub initial_score: f64,
    pub iterations: usize,
    pub accepted: usize,
    pub improvements: usize,
    pub reheats: usize,
    pub faults: usize,
    pub elapsed: Duration,
}

// ============================================================================
// Acceptance
// ============================================================================

/// Annealing acceptance: improvements always pass, regressions with
/// probability `exp(delta / temperature)`.
pub fn accept<R: Rng + ?Sized>(candidate: f64, current: f64, temperature: f64, rng: &mut R) -> bool {
    if candidate > current {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    rng.gen_range(0.0..1.0) < ((candidate - current) / temperature).exp()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `step`, turning both its error and a panic into a message.
fn guarded<T>(step: impl FnOnce() -> Result<T, SchedulerError>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// Perturb a copy of `current` and re-optimize it.
fn iterate<R: Rng + ?Sized>(
    current: &Schedule,
    strategy: Strategy,
    strength: f64,
    budget: Duration,
    rng: &mut R,
) -> Result<Schedule, String> {
    guarded(|| {
        let mut candidate = current.clone();
        perturb(&mut candidate, strategy, strength, rng);
        local_search(&mut candidate, budget).map(|_| candidate)
    })
}

// ============================================================================
// Driver
// ============================================================================

/// Run the driver once on a copy of `problem`.
///
/// The options come from `problem`'s configuration. With `max_iterations`
/// set to zero the result is the searched initial schedule.
pub fn run_mils<R: Rng + ?Sized>(problem: &Schedule, rng: &mut R) -> MilsOutcome {
    let started = Instant::now();
    let options = problem.config().mils.clone();
    let mut faults = 0;

    let mut current = problem.clone();
    let initial = build_initial_solution(&mut current);

    let budget = options.initial_search_budget();
    let searched = guarded(|| {
        let mut searched = current.clone();
        local_search(&mut searched, budget).map(|stats| (searched, stats))
    });
    match searched {
        Ok((searched, stats)) => {
            debug!(moves = stats.moves(), "initial local search done");
            current = searched;
        }
        Err(reason) => {
            warn!(%reason, "initial local search failed, keeping constructed schedule");
            faults += 1;
        }
    }

    let mut current_score = current.score();
    let initial_score = current_score;
    let mut best = current.clone();
    let mut best_score = current_score;

    let mut temperature = options.initial_temperature;
    let mut iterations = 0;
    let mut accepted = 0;
    let mut improvements = 0;
    let mut reheats = 0;
    let mut stale = 0;

    while iterations < options.max_iterations && started.elapsed() < options.max_time() {
        iterations += 1;

        let by_iterations = iterations as f64 / options.max_iterations as f64;
        let by_time = started.elapsed().as_secs_f64() / options.max_seconds.max(f64::EPSILON);
        let strength = perturbation_strength(
            by_iterations.max(by_time),
            options.min_strength,
            options.max_strength,
        );
        let strategy = Strategy::choose(rng);

        match iterate(&current, strategy, strength, options.iteration_search_budget(), rng) {
            Ok(candidate) => {
                let candidate_score = candidate.score();
                let new_best = candidate_score > best_score;
                if new_best {
                    best = candidate.clone();
                    best_score = candidate_score;
                    improvements += 1;
                    stale = 0;
                    debug!(iteration = iterations, score = best_score, ?strategy, "new best");
                } else {
                    stale += 1;
                }
                if accept(candidate_score, current_score, temperature, rng) {
                    current = candidate;
                    current_score = candidate_score;
                    accepted += 1;
                }
            }
            Err(reason) => {
                warn!(iteration = iterations, ?strategy, %reason, "iteration failed");
                faults += 1;
                stale += 1;
            }
        }

        temperature *= options.cooling_rate;
        if stale >= options.plateau_iterations {
            temperature *= options.reheat_factor;
            stale = 0;
            reheats += 1;
            debug!(iteration = iterations, temperature, "reheating");
        }
    }

    let elapsed = started.elapsed();
    info!(
        iterations,
        accepted,
        reheats,
        faults,
        score = best_score,
        elapsed_ms = elapsed.as_millis() as u64,
        "MILS run finished"
    );

    MilsOutcome {
        best,
        best_score,
        initial,
        initial_score,
        iterations,
        accepted,
        improvements,
        reheats,
        faults,
        elapsed,
    }
}

/// Run `num_runs` independent drivers in parallel and keep the best.
///
/// Run `i` is seeded with `seed + i`. A run that panics is dropped; only
/// when every run fails is an error returned.
pub fn solve(problem: &Schedule) -> Result<MilsOutcome, SchedulerError> {
    let options = &problem.config().mils;
    let runs = options.num_runs.max(1);
    let seed = options.seed;
    info!(runs, errands = problem.errands().len(), "starting MILS runs");

    let outcomes: Vec<MilsOutcome> = (0..runs)
        .into_par_iter()
        .filter_map(|run| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(run as u64));
                run_mils(problem, &mut rng)
            }));
            match result {
                Ok(outcome) => {
                    info!(run, score = outcome.best_score, "run completed");
                    Some(outcome)
                }
                Err(payload) => {
                    error!(run, reason = %panic_message(payload.as_ref()), "run failed");
                    None
                }
            }
        })
        .collect();

    outcomes
        .into_iter()
        .max_by(|a, b| a.best_score.total_cmp(&b.best_score))
        .ok_or(SchedulerError::AllRunsFailed(runs))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{MilsOptions, SchedulerConfig};
    use crate::contractor::{Contractor, ContractorId};
    use crate::errand::{Errand, ErrandId};
    use crate::grid::Location;
    use crate::manhattan::ManhattanEstimate;
    use crate::traits::TravelTimeProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn problem(mils: MilsOptions) -> Schedule {
        let config = Arc::new(SchedulerConfig {
            horizon_days: 3,
            mils,
            ..SchedulerConfig::default()
        });
        let kinds = ["Delivery", "Dog Walk", "Detail Car", "Cut Grass", "Outing"];
        let errands = (0..8)
            .map(|i| {
                Errand::new(
                    ErrandId(i),
                    kinds[i % kinds.len()],
                    Location { x: (i as i64 * 11) % 30, y: (i as i64 * 5) % 30 },
                    &config.catalog,
                    config.sla_days,
                )
                .unwrap()
            })
            .collect();
        let contractors = vec![
            Contractor::new(ContractorId(0), Location { x: 0, y: 0 }, 3),
            Contractor::new(ContractorId(1), Location { x: 25, y: 25 }, 3),
        ];
        Schedule::new(config, Arc::new(ManhattanEstimate::default()), contractors, errands).unwrap()
    }

    fn quick(max_iterations: usize) -> MilsOptions {
        MilsOptions {
            max_iterations,
            max_seconds: 30.0,
            num_runs: 3,
            plateau_iterations: 5,
            ..MilsOptions::default()
        }
    }

    #[test]
    fn test_accept_rule() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(accept(10.0, 5.0, 0.0, &mut rng));
        assert!(!accept(5.0, 10.0, 0.0, &mut rng));
        assert!(!accept(10.0, 10.0, 0.0, &mut rng));
        // exp(-1000) is zero in practice.
        assert!(!accept(0.0, 1000.0, 1.0, &mut rng));
        let hot = (0..200).filter(|_| accept(9.0, 10.0, 1e6, &mut rng)).count();
        assert!(hot > 190);
    }

    #[test]
    fn test_best_is_never_worse_than_initial() {
        let p = problem(quick(25));
        let outcome = run_mils(&p, &mut StdRng::seed_from_u64(7));
        assert_eq!(outcome.iterations, 25);
        assert!(outcome.best_score >= outcome.initial_score);
        assert!((outcome.best.score() - outcome.best_score).abs() < 1e-9);
        assert_eq!(outcome.faults, 0);
        outcome.best.validate().unwrap();
    }

    #[test]
    fn test_plateau_triggers_reheat() {
        let p = problem(MilsOptions {
            plateau_iterations: 1,
            ..quick(10)
        });
        let outcome = run_mils(&p, &mut StdRng::seed_from_u64(1));
        assert!(outcome.reheats + outcome.improvements >= outcome.iterations);
    }

    #[test]
    fn test_problem_is_left_untouched() {
        let p = problem(quick(5));
        let before = p.clone();
        run_mils(&p, &mut StdRng::seed_from_u64(3));
        assert_eq!(p, before);
    }

    /// Manhattan travel that panics on exactly one call.
    #[derive(Debug)]
    struct FlakyTravel {
        inner: ManhattanEstimate,
        calls: AtomicUsize,
        panic_at: AtomicUsize,
    }

    impl TravelTimeProvider for FlakyTravel {
        fn travel_time(&self, from: Location, to: Location) -> f64 {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.panic_at.load(Ordering::SeqCst) {
                panic!("travel backend failed");
            }
            self.inner.travel_time(from, to)
        }
    }

    #[test]
    fn test_failed_initial_search_keeps_constructed_schedule() {
        let travel = Arc::new(FlakyTravel {
            inner: ManhattanEstimate::default(),
            calls: AtomicUsize::new(0),
            panic_at: AtomicUsize::new(usize::MAX),
        });
        let base = problem(quick(0));
        let p = Schedule::new(
            base.shared_config(),
            travel.clone(),
            base.contractors().to_vec(),
            base.errands().to_vec(),
        )
        .unwrap();

        // Construction is deterministic: count its calls on a copy, then
        // fail the first call made after construction inside the run.
        let mut constructed = p.clone();
        let before = travel.calls.load(Ordering::SeqCst);
        build_initial_solution(&mut constructed);
        let after = travel.calls.load(Ordering::SeqCst);
        travel.panic_at.store(after + (after - before), Ordering::SeqCst);

        let outcome = run_mils(&p, &mut StdRng::seed_from_u64(0));
        assert_eq!(outcome.faults, 1);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.best, constructed);
        assert_eq!(outcome.initial.assigned_errands, constructed.completed().len());
    }

    #[test]
    fn test_solve_keeps_best_run() {
        let p = problem(quick(10));
        let outcome = solve(&p).unwrap();
        for run in 0..3 {
            let single = run_mils(&p, &mut StdRng::seed_from_u64(run));
            assert!(outcome.best_score + 1e-9 >= single.best_score);
        }
    }
}
