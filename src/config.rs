//! Planner configuration.
//!
//! Everything the original world kept in module-level constants lives here and
//! is handed to each component explicitly, so independent configurations can
//! coexist in one process.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Per-type details of an errand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrandType {
    /// Base charge in currency units.
    pub charge: f64,
    /// Service duration in minutes.
    pub minutes: u32,
    /// Customer must be at home while the errand is performed.
    pub home_required: bool,
    /// Bonus per day completed ahead of the SLA deadline.
    pub early_incentive: f64,
    /// Penalty per day completed after the SLA deadline.
    pub late_penalty: f64,
    /// Higher is scheduled first.
    pub priority: u32,
}

impl ErrandType {
    pub fn new(
        charge: f64,
        minutes: u32,
        home_required: bool,
        early_incentive: f64,
        late_penalty: f64,
        priority: u32,
    ) -> Self {
        Self {
            charge,
            minutes,
            home_required,
            early_incentive,
            late_penalty,
            priority,
        }
    }
}

/// Fixed catalog mapping errand type names to their details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrandCatalog {
    types: BTreeMap<String, ErrandType>,
}

impl Default for ErrandCatalog {
    fn default() -> Self {
        let mut types = BTreeMap::new();
        types.insert("Delivery".to_string(), ErrandType::new(10.0, 30, false, 5.0, 0.25, 1));
        types.insert("Dog Walk".to_string(), ErrandType::new(50.0, 60, true, 3.0, 0.0, 2));
        types.insert("Detail Car".to_string(), ErrandType::new(100.0, 90, true, 2.5, 0.1, 2));
        types.insert("Cut Grass".to_string(), ErrandType::new(80.0, 120, false, 2.0, 0.0, 1));
        types.insert("Outing".to_string(), ErrandType::new(300.0, 240, true, 3.0, 0.1, 3));
        types.insert("Moving".to_string(), ErrandType::new(5000.0, 480, true, 2.0, 300.0, 5));
        Self { types }
    }
}

impl ErrandCatalog {
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, name: impl Into<String>, details: ErrandType) -> Self {
        self.types.insert(name.into(), details);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ErrandType> {
        self.types.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Parameters of the Modified Iterated Local Search driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilsOptions {
    pub max_iterations: usize,
    /// Wall-clock budget of one run, in seconds.
    pub max_seconds: f64,
    pub initial_temperature: f64,
    /// Multiplicative cooling applied after every iteration.
    pub cooling_rate: f64,
    /// Independent runs executed by the multi-run wrapper.
    pub num_runs: usize,
    /// Iterations without a new best before the temperature is raised.
    pub plateau_iterations: usize,
    pub reheat_factor: f64,
    pub min_strength: f64,
    pub max_strength: f64,
    /// Budget of the local search following construction, in seconds.
    pub initial_search_seconds: f64,
    /// Budget of the local search inside one iteration, in seconds.
    pub iteration_search_seconds: f64,
    pub seed: u64,
}

impl Default for MilsOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_seconds: 60.0,
            initial_temperature: 100.0,
            cooling_rate: 0.995,
            num_runs: 5,
            plateau_iterations: 50,
            reheat_factor: 2.0,
            min_strength: 0.1,
            max_strength: 0.5,
            initial_search_seconds: 10.0,
            iteration_search_seconds: 5.0,
            seed: 0,
        }
    }
}

impl MilsOptions {
    pub fn max_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_seconds)
    }

    pub fn initial_search_budget(&self) -> Duration {
        Duration::from_secs_f64(self.initial_search_seconds)
    }

    pub fn iteration_search_budget(&self) -> Duration {
        Duration::from_secs_f64(self.iteration_search_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Side length of the square city grid, in cells.
    pub grid_size: usize,
    /// Travel speed in km/h; one grid cell is one kilometre.
    pub speed_kmh: f64,
    /// Work day start, minutes from midnight.
    pub work_start: u32,
    /// Work day end, minutes from midnight.
    pub work_end: u32,
    /// Number of days in the scheduling horizon.
    pub horizon_days: usize,
    /// Days within which an errand should be completed.
    pub sla_days: u32,
    pub catalog: ErrandCatalog,
    /// Score penalty per minute of travel.
    pub travel_weight: f64,
    /// Fraction of the charge paid as bonus for immediate completion.
    pub early_bonus_weight: f64,
    /// Granularity of candidate start times, in minutes.
    pub time_step: u32,
    /// Half-width of the timing optimization window, in minutes.
    pub timing_window: u32,
    /// Minutes a stop may run past work end on the final horizon day.
    pub final_day_overflow: u32,
    /// Errands at least this long may be split across days.
    pub split_min_duration: u32,
    /// Smallest fraction worth committing when splitting.
    pub min_split_minutes: u32,
    pub mils: MilsOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grid_size: 100,
            speed_kmh: 30.0,
            work_start: 8 * 60,
            work_end: 17 * 60,
            horizon_days: 10,
            sla_days: 10,
            catalog: ErrandCatalog::default(),
            travel_weight: 0.1,
            early_bonus_weight: 0.1,
            time_step: 15,
            timing_window: 60,
            final_day_overflow: 120,
            split_min_duration: 240,
            min_split_minutes: 60,
            mils: MilsOptions::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SchedulerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn work_day_minutes(&self) -> u32 {
        self.work_end.saturating_sub(self.work_start)
    }

    pub fn last_day(&self) -> usize {
        self.horizon_days.saturating_sub(1)
    }

    /// Latest admissible end of a stop on `day`.
    pub fn day_end_limit(&self, day: usize) -> u32 {
        if day == self.last_day() {
            self.work_end + self.final_day_overflow
        } else {
            self.work_end
        }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        let invalid = |msg: &str| Err(SchedulerError::InvalidConfig(msg.to_string()));

        if self.grid_size == 0 {
            return invalid("grid_size must be positive");
        }
        if !(self.speed_kmh > 0.0) {
            return invalid("speed_kmh must be positive");
        }
        if self.work_start >= self.work_end || self.work_end > 24 * 60 {
            return invalid("work window must satisfy work_start < work_end <= 1440");
        }
        if self.horizon_days == 0 {
            return invalid("horizon_days must be positive");
        }
        if self.sla_days == 0 {
            return invalid("sla_days must be positive");
        }
        if self.time_step == 0 {
            return invalid("time_step must be positive");
        }
        if self.catalog.is_empty() {
            return invalid("errand catalog is empty");
        }
        if self.catalog.types.values().any(|t| t.minutes == 0) {
            return invalid("errand types need a positive duration");
        }
        if !(self.mils.cooling_rate > 0.0 && self.mils.cooling_rate <= 1.0) {
            return invalid("cooling_rate must be in (0, 1]");
        }
        if self.mils.reheat_factor < 1.0 {
            return invalid("reheat_factor must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.mils.min_strength)
            || !(0.0..=1.0).contains(&self.mils.max_strength)
            || self.mils.min_strength > self.mils.max_strength
        {
            return invalid("perturbation strengths must satisfy 0 <= min <= max <= 1");
        }
        if self.mils.max_seconds < 0.0
            || self.mils.initial_search_seconds < 0.0
            || self.mils.iteration_search_seconds < 0.0
        {
            return invalid("time budgets must not be negative");
        }
        Ok(())
    }
}
