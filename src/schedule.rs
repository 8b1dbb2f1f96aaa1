//! The assignment ledger.
//!
//! A [`Schedule`] owns every contractor and errand of one problem, the
//! day-indexed table of assignments and the running profit. All mutation goes
//! through [`Schedule::assign_errand`] / [`Schedule::assign_portion`] and
//! [`Schedule::remove_assignment`], which are exact inverses of each other.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::config::SchedulerConfig;
use crate::contractor::{Contractor, ContractorId, Stop};
use crate::errand::{to_cents, Errand, ErrandId};
use crate::error::{Infeasible, SchedulerError};
use crate::grid::Location;
use crate::traits::TravelTimeProvider;

/// An errand (or a fraction of it) placed on a contractor's day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub errand: ErrandId,
    pub contractor: ContractorId,
    pub start: u32,
    pub minutes: u32,
}

impl Assignment {
    pub fn end(&self) -> u32 {
        self.start + self.minutes
    }

    fn sort_key(&self) -> (ContractorId, u32) {
        (self.contractor, self.start)
    }
}

/// A feasible placement found by a slot search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub contractor: ContractorId,
    pub day: usize,
    pub start: u32,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    config: Arc<SchedulerConfig>,
    travel: Arc<dyn TravelTimeProvider>,
    contractors: Vec<Contractor>,
    errands: Vec<Errand>,
    unassigned: BTreeSet<ErrandId>,
    completed: BTreeSet<ErrandId>,
    days: Vec<Vec<Assignment>>,
    profit_cents: i64,
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.contractors == other.contractors
            && self.errands == other.errands
            && self.unassigned == other.unassigned
            && self.completed == other.completed
            && self.days == other.days
            && self.profit_cents == other.profit_cents
    }
}

impl Schedule {
    /// Build an empty ledger.
    ///
    /// Errand and contractor ids must be dense (`id == position`). Contractor
    /// routes are reset to the configured horizon.
    pub fn new(
        config: Arc<SchedulerConfig>,
        travel: Arc<dyn TravelTimeProvider>,
        contractors: Vec<Contractor>,
        errands: Vec<Errand>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        for (position, errand) in errands.iter().enumerate() {
            if errand.id() != ErrandId(position) {
                return Err(SchedulerError::InvalidErrandId {
                    position,
                    id: errand.id(),
                });
            }
        }
        for errand in &errands {
            if let Some(&missing) = errand
                .predecessors()
                .iter()
                .find(|p| p.0 >= errands.len() || **p == errand.id())
            {
                return Err(SchedulerError::UnknownPredecessor {
                    errand: errand.id(),
                    predecessor: missing,
                });
            }
        }
        for (position, contractor) in contractors.iter().enumerate() {
            if contractor.id() != ContractorId(position) {
                return Err(SchedulerError::InvalidConfig(format!(
                    "contractor at position {} has id {}",
                    position,
                    contractor.id()
                )));
            }
        }

        let contractors = contractors
            .into_iter()
            .map(|c| Contractor::new(c.id(), c.start_location(), config.horizon_days))
            .collect();
        let unassigned = errands.iter().map(Errand::id).collect();

        Ok(Self {
            days: vec![Vec::new(); config.horizon_days],
            config,
            travel,
            contractors,
            errands,
            unassigned,
            completed: BTreeSet::new(),
            profit_cents: 0,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<SchedulerConfig> {
        Arc::clone(&self.config)
    }

    pub fn travel(&self) -> &dyn TravelTimeProvider {
        self.travel.as_ref()
    }

    pub fn horizon_days(&self) -> usize {
        self.days.len()
    }

    pub fn contractors(&self) -> &[Contractor] {
        &self.contractors
    }

    pub fn contractor(&self, id: ContractorId) -> &Contractor {
        &self.contractors[id.0]
    }

    pub fn errands(&self) -> &[Errand] {
        &self.errands
    }

    pub fn errand(&self, id: ErrandId) -> &Errand {
        &self.errands[id.0]
    }

    pub fn unassigned(&self) -> &BTreeSet<ErrandId> {
        &self.unassigned
    }

    pub fn completed(&self) -> &BTreeSet<ErrandId> {
        &self.completed
    }

    /// Assignments of `day`, ordered by contractor then start time.
    pub fn assignments(&self, day: usize) -> &[Assignment] {
        self.days.get(day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every assignment with its day.
    pub fn all_assignments(&self) -> Vec<(usize, Assignment)> {
        self.days
            .iter()
            .enumerate()
            .flat_map(|(day, table)| table.iter().map(move |a| (day, *a)))
            .collect()
    }

    pub fn assignment_count(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }

    pub fn travel_minutes(&self, from: Location, to: Location) -> Option<u32> {
        self.travel.travel_minutes(from, to)
    }

    // ------------------------------------------------------------------
    // Feasibility
    // ------------------------------------------------------------------

    /// Whether `errand` can be placed whole on `contractor`'s `day` at `start`.
    pub fn can_assign(
        &self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        start: u32,
    ) -> Result<(), Infeasible> {
        let minutes = self.errand(errand).remaining();
        self.can_assign_portion(contractor, errand, day, start, minutes)
    }

    /// Whether `minutes` of `errand` can be placed on `contractor`'s `day` at `start`.
    ///
    /// Travel from the preceding stop (or the start location at work start)
    /// and on to the following stop is part of the check.
    pub fn can_assign_portion(
        &self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        start: u32,
        minutes: u32,
    ) -> Result<(), Infeasible> {
        self.check_placement(contractor, errand, day, start, minutes, true)
    }

    fn check_placement(
        &self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        start: u32,
        minutes: u32,
        check_predecessors: bool,
    ) -> Result<(), Infeasible> {
        if day >= self.horizon_days() {
            return Err(Infeasible::DayOutOfRange);
        }
        if !self.unassigned.contains(&errand) {
            return Err(Infeasible::NotUnassigned);
        }
        let e = self.errand(errand);
        if minutes == 0 || minutes > e.remaining() {
            return Err(Infeasible::InvalidDuration);
        }
        if check_predecessors && !e.predecessors_satisfied(&self.completed) {
            return Err(Infeasible::PredecessorsPending);
        }
        if let Some((window_start, window_end)) = e.window() {
            if start < window_start || start + minutes > window_end {
                return Err(Infeasible::OutsideTimeWindow);
            }
        }
        if start < self.config.work_start || start + minutes > self.config.day_end_limit(day) {
            return Err(Infeasible::OutsideWorkHours);
        }
        self.gap_fits(contractor, e.location(), day, start, minutes)
    }

    fn gap_fits(
        &self,
        contractor: ContractorId,
        location: Location,
        day: usize,
        start: u32,
        minutes: u32,
    ) -> Result<(), Infeasible> {
        let c = self.contractor(contractor);
        let (prev, next) = c.neighbors_at(day, start);
        let (from, ready) = match prev {
            Some(stop) => (stop.location, stop.end()),
            None => (c.start_location(), self.config.work_start),
        };
        let inbound = self
            .travel_minutes(from, location)
            .ok_or(Infeasible::Unreachable)?;
        if ready + inbound > start {
            return Err(Infeasible::Overlap);
        }
        if let Some(next) = next {
            let outbound = self
                .travel_minutes(location, next.location)
                .ok_or(Infeasible::Unreachable)?;
            if start + minutes + outbound > next.start {
                return Err(Infeasible::Overlap);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Place the whole remaining service time of `errand`.
    pub fn assign_errand(
        &mut self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        start: u32,
    ) -> Result<Assignment, Infeasible> {
        let minutes = self.errand(errand).remaining();
        self.assign_portion(contractor, errand, day, start, minutes)
    }

    /// Place `minutes` of `errand`. The errand completes once nothing remains.
    pub fn assign_portion(
        &mut self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        start: u32,
        minutes: u32,
    ) -> Result<Assignment, Infeasible> {
        self.place(contractor, errand, day, start, minutes, true)
    }

    fn place(
        &mut self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        start: u32,
        minutes: u32,
        check_predecessors: bool,
    ) -> Result<Assignment, Infeasible> {
        self.check_placement(contractor, errand, day, start, minutes, check_predecessors)?;

        let location = self.errand(errand).location();
        self.contractors[contractor.0].commit(
            day,
            Stop {
                errand,
                location,
                start,
                minutes,
            },
        );

        let assignment = Assignment {
            errand,
            contractor,
            start,
            minutes,
        };
        let table = &mut self.days[day];
        let position = table.partition_point(|a| a.sort_key() <= assignment.sort_key());
        table.insert(position, assignment);

        self.errands[errand.0].consume(minutes);
        if self.errand(errand).remaining() == 0 {
            self.unassigned.remove(&errand);
            self.completed.insert(errand);
            let completion_day = self.completion_day(errand).unwrap_or(day);
            self.profit_cents += to_cents(self.errand(errand).profit_on(completion_day));
        }

        trace!(%errand, %contractor, day, start, minutes, "assigned");
        Ok(assignment)
    }

    /// Undo an assignment. Returns `false` if it is not in the ledger.
    pub fn remove_assignment(&mut self, day: usize, assignment: &Assignment) -> bool {
        let Some(position) = self
            .days
            .get(day)
            .and_then(|table| table.iter().position(|a| a == assignment))
        else {
            return false;
        };

        let errand = assignment.errand;
        if self.completed.contains(&errand) {
            let completion_day = self.completion_day(errand).unwrap_or(day);
            self.profit_cents -= to_cents(self.errand(errand).profit_on(completion_day));
            self.completed.remove(&errand);
            self.unassigned.insert(errand);
        }

        self.days[day].remove(position);
        self.contractors[assignment.contractor.0].uncommit(day, errand, assignment.start);
        self.errands[errand.0].restore(assignment.minutes);

        trace!(%errand, contractor = %assignment.contractor, day, "removed");
        true
    }

    /// Remove every assignment, returning them with their days.
    pub fn clear(&mut self) -> Vec<(usize, Assignment)> {
        let all = self.all_assignments();
        for (day, assignment) in &all {
            self.remove_assignment(*day, assignment);
        }
        all
    }

    /// Re-apply assignments removed earlier, in the given order.
    ///
    /// Predecessors are not re-checked: they held when the assignment was
    /// first made, and a dependent may legitimately outlive the removal of
    /// its predecessor.
    pub fn restore(&mut self, assignments: &[(usize, Assignment)]) -> Result<(), SchedulerError> {
        for (day, a) in assignments {
            self.place(a.contractor, a.errand, *day, a.start, a.minutes, false)
                .map_err(|reason| SchedulerError::RollbackFailed {
                    errand: a.errand,
                    day: *day,
                    reason,
                })?;
        }
        Ok(())
    }

    /// Latest day holding a piece of `errand`.
    pub fn completion_day(&self, errand: ErrandId) -> Option<usize> {
        self.days
            .iter()
            .rposition(|table| table.iter().any(|a| a.errand == errand))
    }

    // ------------------------------------------------------------------
    // Objectives
    // ------------------------------------------------------------------

    /// Incrementally maintained profit of all completed errands.
    pub fn total_profit(&self) -> f64 {
        self.profit_cents as f64 / 100.0
    }

    pub fn profit_cents(&self) -> i64 {
        self.profit_cents
    }

    /// Profit recomputed from scratch, in cents.
    pub fn recompute_profit_cents(&self) -> i64 {
        self.completed
            .iter()
            .filter_map(|&e| {
                self.completion_day(e)
                    .map(|day| to_cents(self.errand(e).profit_on(day)))
            })
            .sum()
    }

    /// Profit recomputed from the current assignments.
    pub fn calculate_total_profit(&self) -> f64 {
        self.recompute_profit_cents() as f64 / 100.0
    }

    /// Fraction of errands completed; an empty problem is fully compliant.
    pub fn calculate_sla_compliance(&self) -> f64 {
        if self.errands.is_empty() {
            return 1.0;
        }
        self.completed.len() as f64 / self.errands.len() as f64
    }

    /// Booked service minutes over total contractor capacity.
    pub fn calculate_resource_utilization(&self) -> f64 {
        let capacity = self.contractors.len() as f64
            * self.horizon_days() as f64
            * self.config.work_day_minutes() as f64;
        if capacity <= 0.0 {
            return 0.0;
        }
        let booked: u32 = self.contractors.iter().map(Contractor::workload).sum();
        booked as f64 / capacity
    }

    /// Reward for finishing well before the SLA horizon.
    ///
    /// Completion is measured in fractional days, so both earlier days and
    /// earlier times within a day score higher.
    pub fn early_completion_bonus(&self, errand: &Errand, day: usize, finish: u32) -> f64 {
        let span = self.config.work_day_minutes().max(1) as f64;
        let within_day = finish.saturating_sub(self.config.work_start) as f64 / span;
        let t = day as f64 + errand.days_since_request() as f64 + within_day;
        let sla = errand.sla_days().max(1) as f64;
        self.config.early_bonus_weight * errand.charge() * (1.0 - t / sla).max(0.0)
    }

    /// Minutes driven by `contractor` on `day`, from its start location.
    pub fn route_travel(&self, contractor: ContractorId, day: usize) -> f64 {
        let c = self.contractor(contractor);
        let mut from = c.start_location();
        let mut total = 0.0;
        for stop in c.route(day) {
            total += self.travel.travel_time(from, stop.location);
            from = stop.location;
        }
        total
    }

    pub fn total_travel(&self) -> f64 {
        (0..self.horizon_days())
            .flat_map(|day| self.contractors.iter().map(move |c| (c.id(), day)))
            .map(|(c, day)| self.route_travel(c, day))
            .sum()
    }

    /// Search objective: profit plus early-completion bonus of completed
    /// errands, minus weighted travel.
    pub fn score(&self) -> f64 {
        // Completion day and finish time of each errand's last piece.
        let mut finish: Vec<Option<(usize, u32)>> = vec![None; self.errands.len()];
        for (day, table) in self.days.iter().enumerate() {
            for a in table {
                let slot = &mut finish[a.errand.0];
                *slot = match *slot {
                    Some((d, end)) if d == day => Some((d, end.max(a.end()))),
                    _ => Some((day, a.end())),
                };
            }
        }

        let gain: f64 = self
            .completed
            .iter()
            .filter_map(|&e| finish[e.0].map(|(day, end)| (e, day, end)))
            .map(|(e, day, end)| {
                let errand = self.errand(e);
                to_cents(errand.profit_on(day)) as f64 / 100.0
                    + self.early_completion_bonus(errand, day, end)
            })
            .sum();

        gain - self.config.travel_weight * self.total_travel()
    }

    /// Score of inserting `minutes` of `errand` at a slot assumed feasible:
    /// profit and bonus if it completes the errand, minus the added travel.
    pub fn insertion_score(
        &self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        start: u32,
        minutes: u32,
    ) -> f64 {
        let e = self.errand(errand);
        let c = self.contractor(contractor);
        let (prev, next) = c.neighbors_at(day, start);
        let from = prev.map(|s| s.location).unwrap_or(c.start_location());

        let mut added = self.travel.travel_time(from, e.location());
        if let Some(next) = next {
            added += self.travel.travel_time(e.location(), next.location)
                - self.travel.travel_time(from, next.location);
        }

        let value = if minutes >= e.remaining() {
            e.profit_on(day) + self.early_completion_bonus(e, day, start + minutes)
        } else {
            0.0
        };
        value - self.config.travel_weight * added
    }

    // ------------------------------------------------------------------
    // Slot search
    // ------------------------------------------------------------------

    /// Candidate start times for `minutes` of `errand` on a contractor's day.
    ///
    /// The fixed time-step grid over the admissible window, plus the tight
    /// starts right after each stop (and after leaving home).
    pub fn candidate_starts(
        &self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
        minutes: u32,
    ) -> Vec<u32> {
        let e = self.errand(errand);
        let (window_start, window_end) = e.window().unwrap_or((0, u32::MAX));
        let lo = self.config.work_start.max(window_start);
        let hi = self.config.day_end_limit(day).min(window_end);
        if lo + minutes > hi {
            return Vec::new();
        }
        let latest = hi - minutes;

        let mut starts: Vec<u32> = (lo..=latest)
            .step_by(self.config.time_step as usize)
            .collect();

        let c = self.contractor(contractor);
        let departures = std::iter::once((c.start_location(), self.config.work_start))
            .chain(c.route(day).iter().map(|s| (s.location, s.end())));
        for (from, ready) in departures {
            if let Some(leg) = self.travel_minutes(from, e.location()) {
                let tight = (ready + leg).max(lo);
                if tight <= latest {
                    starts.push(tight);
                }
            }
        }

        starts.sort_unstable();
        starts.dedup();
        starts
    }

    /// Earliest feasible start for the remaining time of `errand`.
    pub fn earliest_feasible_start(
        &self,
        contractor: ContractorId,
        errand: ErrandId,
        day: usize,
    ) -> Option<u32> {
        let minutes = self.errand(errand).remaining();
        self.candidate_starts(contractor, errand, day, minutes)
            .into_iter()
            .find(|&start| {
                self.can_assign_portion(contractor, errand, day, start, minutes)
                    .is_ok()
            })
    }

    /// Best-scoring feasible slot for the remaining time of `errand` among
    /// the contractor/day pairs accepted by `allow`.
    pub fn best_slot<F>(&self, errand: ErrandId, allow: F) -> Option<Slot>
    where
        F: Fn(ContractorId, usize) -> bool,
    {
        let minutes = self.errand(errand).remaining();
        if minutes == 0 || !self.unassigned.contains(&errand) {
            return None;
        }

        let mut best: Option<Slot> = None;
        for day in 0..self.horizon_days() {
            for contractor in self.contractors.iter().map(Contractor::id) {
                if !allow(contractor, day) {
                    continue;
                }
                for start in self.candidate_starts(contractor, errand, day, minutes) {
                    if self
                        .can_assign_portion(contractor, errand, day, start, minutes)
                        .is_err()
                    {
                        continue;
                    }
                    let score = self.insertion_score(contractor, errand, day, start, minutes);
                    if best.is_none_or(|b| score > b.score) {
                        best = Some(Slot {
                            contractor,
                            day,
                            start,
                            score,
                        });
                    }
                }
            }
        }
        best
    }

    /// Place `errand` at its best feasible slot, if any.
    pub fn insert_best(&mut self, errand: ErrandId) -> Option<Assignment> {
        let slot = self.best_slot(errand, |_, _| true)?;
        self.assign_errand(slot.contractor, errand, slot.day, slot.start)
            .ok()
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Re-check every ledger invariant from scratch.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let violation = |msg: String| Err(SchedulerError::Violation(msg));

        let mut placed = vec![0u32; self.errands.len()];
        for (day, table) in self.days.iter().enumerate() {
            if table.windows(2).any(|w| w[0].sort_key() > w[1].sort_key()) {
                return violation(format!("day {} table is not ordered", day));
            }
            for a in table {
                placed[a.errand.0] += a.minutes;
                let matches = self
                    .contractor(a.contractor)
                    .route(day)
                    .iter()
                    .any(|s| s.errand == a.errand && s.start == a.start && s.minutes == a.minutes);
                if !matches {
                    return violation(format!("{} on day {} missing from route", a.errand, day));
                }
            }
        }

        for errand in &self.errands {
            let id = errand.id();
            if self.unassigned.contains(&id) == self.completed.contains(&id) {
                return violation(format!("{} must be either unassigned or completed", id));
            }
            if self.completed.contains(&id) != (errand.remaining() == 0) {
                return violation(format!("{} completion does not match remaining time", id));
            }
            if placed[id.0] + errand.remaining() != errand.duration() {
                return violation(format!("{} placed minutes do not add up", id));
            }
        }

        for c in &self.contractors {
            let mut route_len = 0;
            for day in 0..self.horizon_days() {
                let mut from = c.start_location();
                let mut ready = self.config.work_start;
                for stop in c.route(day) {
                    route_len += 1;
                    let leg = self
                        .travel_minutes(from, stop.location)
                        .ok_or_else(|| SchedulerError::Violation(format!("{} unreachable", stop.errand)))?;
                    if ready + leg > stop.start {
                        return violation(format!("{} overlaps on day {} for {}", stop.errand, day, c.id()));
                    }
                    if stop.end() > self.config.day_end_limit(day) {
                        return violation(format!("{} ends after work hours", stop.errand));
                    }
                    if let Some((ws, we)) = self.errand(stop.errand).window() {
                        if stop.start < ws || stop.end() > we {
                            return violation(format!("{} outside its window", stop.errand));
                        }
                    }
                    from = stop.location;
                    ready = stop.end();
                }
            }
            let table_len = self
                .days
                .iter()
                .flatten()
                .filter(|a| a.contractor == c.id())
                .count();
            if route_len != table_len {
                return violation(format!("{} route and ledger disagree", c.id()));
            }
        }

        if self.profit_cents != self.recompute_profit_cents() {
            return violation(format!(
                "profit accumulator {} != recomputed {}",
                self.profit_cents,
                self.recompute_profit_cents()
            ));
        }
        Ok(())
    }
}
