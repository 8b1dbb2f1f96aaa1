//! Read-only, serializable view of a finished schedule.

use serde::Serialize;

use crate::contractor::ContractorId;
use crate::errand::ErrandId;
use crate::mils::MilsOutcome;
use crate::schedule::Schedule;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentEntry {
    pub errand: ErrandId,
    pub contractor: ContractorId,
    pub kind: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub day: usize,
    pub assignments: Vec<AssignmentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleSummary {
    pub days: Vec<DaySummary>,
    pub total_profit: f64,
    pub sla_compliance: f64,
    pub resource_utilization: f64,
    pub total_travel: f64,
    pub score: f64,
    pub unassigned: Vec<ErrandId>,
}

impl ScheduleSummary {
    pub fn of(schedule: &Schedule) -> Self {
        let days = (0..schedule.horizon_days())
            .map(|day| DaySummary {
                day,
                assignments: schedule
                    .assignments(day)
                    .iter()
                    .map(|a| AssignmentEntry {
                        errand: a.errand,
                        contractor: a.contractor,
                        kind: schedule.errand(a.errand).kind().to_string(),
                        start: a.start,
                        end: a.end(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            days,
            total_profit: schedule.total_profit(),
            sla_compliance: schedule.calculate_sla_compliance(),
            resource_utilization: schedule.calculate_resource_utilization(),
            total_travel: schedule.total_travel(),
            score: schedule.score(),
            unassigned: schedule.unassigned().iter().copied().collect(),
        }
    }

    /// `(errand, contractor, start)` triples of `day`, in ledger order.
    pub fn triples(&self, day: usize) -> Vec<(ErrandId, ContractorId, u32)> {
        self.days
            .get(day)
            .map(|d| {
                d.assignments
                    .iter()
                    .map(|a| (a.errand, a.contractor, a.start))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Schedule {
    pub fn summary(&self) -> ScheduleSummary {
        ScheduleSummary::of(self)
    }
}

impl MilsOutcome {
    pub fn summary(&self) -> ScheduleSummary {
        ScheduleSummary::of(&self.best)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SchedulerConfig;
    use crate::contractor::Contractor;
    use crate::errand::Errand;
    use crate::grid::Location;
    use crate::manhattan::ManhattanEstimate;

    #[test]
    fn test_summary_lists_assignments_per_day() {
        let config = Arc::new(SchedulerConfig {
            horizon_days: 2,
            ..SchedulerConfig::default()
        });
        let errands = vec![
            Errand::new(ErrandId(0), "Delivery", Location { x: 5, y: 0 }, &config.catalog, 10).unwrap(),
            Errand::new(ErrandId(1), "Dog Walk", Location { x: 0, y: 5 }, &config.catalog, 10).unwrap(),
        ];
        let contractors = vec![Contractor::new(ContractorId(0), Location { x: 0, y: 0 }, 2)];
        let mut s = Schedule::new(config, Arc::new(ManhattanEstimate::default()), contractors, errands).unwrap();
        s.assign_errand(ContractorId(0), ErrandId(1), 1, 600).unwrap();

        let summary = s.summary();
        assert_eq!(summary.days.len(), 2);
        assert!(summary.triples(0).is_empty());
        assert_eq!(summary.triples(1), vec![(ErrandId(1), ContractorId(0), 600)]);
        assert_eq!(summary.days[1].assignments[0].kind, "Dog Walk");
        assert_eq!(summary.days[1].assignments[0].end, 660);
        assert_eq!(summary.unassigned, vec![ErrandId(0)]);
        assert!((summary.sla_compliance - 0.5).abs() < 1e-12);
        assert!(summary.triples(5).is_empty());

        let json = summary.to_json().unwrap();
        assert!(json.contains("\"total_profit\""));
    }
}
