//! Error taxonomy for the planner.
//!
//! Two kinds of failure are kept apart on purpose: [`SchedulerError`] covers
//! bad input data and broken invariants, while [`Infeasible`] is the ordinary
//! "this placement does not work" answer that drives the search.

use thiserror::Error;

use crate::errand::ErrandId;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid errand type: {0}")]
    UnknownErrandType(String),
    #[error("no road found on the map")]
    NoRoads,
    #[error("location ({x}, {y}) is outside the {size}x{size} grid")]
    LocationOutOfBounds { x: i64, y: i64, size: usize },
    #[error("errand at position {position} has id {id}, expected dense ids")]
    InvalidErrandId { position: usize, id: ErrandId },
    #[error("errand {errand} depends on unknown errand {predecessor}")]
    UnknownPredecessor { errand: ErrandId, predecessor: ErrandId },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("could not restore assignment of errand {errand} on day {day}: {reason}")]
    RollbackFailed {
        errand: ErrandId,
        day: usize,
        reason: Infeasible,
    },
    #[error("schedule invariant violated: {0}")]
    Violation(String),
    #[error("all {0} optimization runs failed")]
    AllRunsFailed(usize),
}

/// Why a placement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Infeasible {
    #[error("day is outside the scheduling horizon")]
    DayOutOfRange,
    #[error("errand is not waiting to be assigned")]
    NotUnassigned,
    #[error("requested duration does not match the remaining service time")]
    InvalidDuration,
    #[error("predecessors are not completed")]
    PredecessorsPending,
    #[error("start time is outside the errand's time window")]
    OutsideTimeWindow,
    #[error("stop does not fit in the work window")]
    OutsideWorkHours,
    #[error("stop overlaps the contractor's route")]
    Overlap,
    #[error("no road path to the errand")]
    Unreachable,
}
