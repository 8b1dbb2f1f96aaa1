//! errand-planner core
//!
//! Multi-day scheduling of priced errands for a fleet of contractors on a
//! road grid: a greedy construction, a local search over swap, relocate and
//! timing moves, and an iterated local search driver with annealing
//! acceptance on top.

pub mod traits;
pub mod config;
pub mod error;
pub mod grid;
pub mod city;
pub mod path;
pub mod router;
pub mod manhattan;
pub mod errand;
pub mod contractor;
pub mod schedule;
pub mod initial;
pub mod local_search;
pub mod perturbation;
pub mod mils;
pub mod summary;
pub mod generate;

pub use config::SchedulerConfig;
pub use error::{Infeasible, SchedulerError};
pub use mils::{solve, MilsOutcome};
pub use schedule::Schedule;
