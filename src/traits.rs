//! Core seams of the planner.

use std::fmt::Debug;

use crate::grid::Location;

/// Travel time between two road-snapped locations.
///
/// Implementations must be pure: the same pair always yields the same value,
/// `travel_time(a, a) == 0`, and the result is symmetric. Unreachable pairs
/// yield `f64::INFINITY`; implementations never panic on them.
pub trait TravelTimeProvider: Send + Sync + Debug {
    /// Minutes to travel from `from` to `to`.
    fn travel_time(&self, from: Location, to: Location) -> f64;

    /// Travel time rounded up to whole minutes, or `None` when unreachable.
    fn travel_minutes(&self, from: Location, to: Location) -> Option<u32> {
        let minutes = self.travel_time(from, to);
        minutes.is_finite().then(|| minutes.ceil() as u32)
    }
}
