//! Errands: priced, timed tasks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{ErrandCatalog, ErrandType};
use crate::error::SchedulerError;
use crate::grid::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrandId(pub usize);

impl std::fmt::Display for ErrandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Errand {
    id: ErrandId,
    kind: String,
    details: ErrandType,
    location: Location,
    window: Option<(u32, u32)>,
    days_since_request: u32,
    predecessors: BTreeSet<ErrandId>,
    sla_days: u32,
    remaining: u32,
}

impl Errand {
    /// Create an errand of catalog type `kind`.
    ///
    /// The SLA horizon defaults to `sla_days`; adjust with [`Errand::with_sla_days`].
    pub fn new(
        id: ErrandId,
        kind: &str,
        location: Location,
        catalog: &ErrandCatalog,
        sla_days: u32,
    ) -> Result<Self, SchedulerError> {
        let details = catalog
            .get(kind)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownErrandType(kind.to_string()))?;
        Ok(Self {
            id,
            kind: kind.to_string(),
            remaining: details.minutes,
            details,
            location,
            window: None,
            days_since_request: 0,
            predecessors: BTreeSet::new(),
            sla_days,
        })
    }

    pub fn with_window(mut self, start: u32, end: u32) -> Self {
        self.window = Some((start, end));
        self
    }

    pub fn with_days_since_request(mut self, days: u32) -> Self {
        self.days_since_request = days;
        self
    }

    pub fn with_predecessor(mut self, predecessor: ErrandId) -> Self {
        self.predecessors.insert(predecessor);
        self
    }

    pub fn with_sla_days(mut self, sla_days: u32) -> Self {
        self.sla_days = sla_days;
        self
    }

    pub fn id(&self) -> ErrandId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn details(&self) -> &ErrandType {
        &self.details
    }

    pub fn charge(&self) -> f64 {
        self.details.charge
    }

    /// Full service time in minutes.
    pub fn duration(&self) -> u32 {
        self.details.minutes
    }

    pub fn priority(&self) -> u32 {
        self.details.priority
    }

    pub fn home_required(&self) -> bool {
        self.details.home_required
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn window(&self) -> Option<(u32, u32)> {
        self.window
    }

    pub fn days_since_request(&self) -> u32 {
        self.days_since_request
    }

    pub fn predecessors(&self) -> &BTreeSet<ErrandId> {
        &self.predecessors
    }

    pub fn sla_days(&self) -> u32 {
        self.sla_days
    }

    /// Service time not yet placed on any route.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub(crate) fn consume(&mut self, minutes: u32) {
        self.remaining = self.remaining.saturating_sub(minutes);
    }

    pub(crate) fn restore(&mut self, minutes: u32) {
        self.remaining = (self.remaining + minutes).min(self.details.minutes);
    }

    /// Profit when completed on `day` (0-based) against an SLA of `sla_days`.
    ///
    /// Every day completed ahead of the deadline earns the early incentive;
    /// every day past it costs the late penalty. Never negative.
    pub fn profit(&self, day: usize, sla_days: u32) -> f64 {
        let elapsed = day as i64 + self.days_since_request as i64;
        let sla = sla_days as i64;
        let mut profit = self.details.charge;
        if elapsed < sla {
            profit += self.details.early_incentive * (sla - elapsed - 1) as f64;
        } else if elapsed > sla {
            profit -= self.details.late_penalty * (elapsed - sla) as f64;
        }
        profit.max(0.0)
    }

    /// Profit against this errand's own SLA horizon.
    pub fn profit_on(&self, day: usize) -> f64 {
        self.profit(day, self.sla_days)
    }

    pub fn predecessors_satisfied(&self, completed: &BTreeSet<ErrandId>) -> bool {
        self.predecessors.iter().all(|p| completed.contains(p))
    }
}

/// Money in whole cents, so ledger updates are exactly invertible.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
