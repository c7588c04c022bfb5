//! Request and response schemas exchanged with the simulation backend.
//!
//! Every payload that crosses the wire has an explicit type here and is
//! checked with [`Validate`] before it is handed to the rest of the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::{Error, Result};

/// Identifier assigned to a project by the backend.
pub type ProjectId = u64;

/// Probability of failure above which a project does not pass.
pub const FAIL_THRESHOLD: f64 = 0.15;

/// Final simulated year when the backend omits it.
pub const DEFAULT_END_YEAR: i32 = 2074;

/// Build years accepted by the backend.
pub const BUILD_YEARS: RangeInclusive<i32> = 2025..=2075;

/// Schema check applied at the transport boundary.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::Malformed(format!("{name} out of range: {p}")))
    }
}

/// Outcome of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Lifecycle of a simulation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    /// Returns `true` for states that never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One sample of the cumulative failure curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailurePoint {
    pub year: i32,
    pub p_failure: f64,
}

/// The four fixed climate scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Baseline,
    ModerateDrought,
    SevereDrought,
    ReducedSnowpack,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Baseline,
        Scenario::ModerateDrought,
        Scenario::SevereDrought,
        Scenario::ReducedSnowpack,
    ];

    /// Key used in the wire format.
    pub fn key(self) -> &'static str {
        match self {
            Scenario::Baseline => "baseline",
            Scenario::ModerateDrought => "moderate_drought",
            Scenario::SevereDrought => "severe_drought",
            Scenario::ReducedSnowpack => "reduced_snowpack",
        }
    }

    /// Human readable description.
    pub fn label(self) -> &'static str {
        match self {
            Scenario::Baseline => "Baseline (historical average)",
            Scenario::ModerateDrought => "Moderate Drought (CMIP6 SSP2-4.5)",
            Scenario::SevereDrought => "Severe Drought (CMIP6 SSP5-8.5)",
            Scenario::ReducedSnowpack => "Reduced Snowpack (-29% snowpack)",
        }
    }
}

/// PASS/FAIL verdict per fixed scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResults {
    pub baseline: Verdict,
    pub moderate_drought: Verdict,
    pub severe_drought: Verdict,
    pub reduced_snowpack: Verdict,
}

impl ScenarioResults {
    pub fn get(&self, scenario: Scenario) -> Verdict {
        match scenario {
            Scenario::Baseline => self.baseline,
            Scenario::ModerateDrought => self.moderate_drought,
            Scenario::SevereDrought => self.severe_drought,
            Scenario::ReducedSnowpack => self.reduced_snowpack,
        }
    }

    /// Scenarios paired with their verdicts in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Scenario, Verdict)> + '_ {
        Scenario::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

/// Full result of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub verdict: Verdict,
    #[serde(rename = "p_failure_by_end_year", alias = "p_failure_by_2074")]
    pub p_failure_by_end_year: f64,
    #[serde(rename = "simulation_end_year", default = "default_end_year")]
    pub end_year: i32,
    pub first_failure_year: Option<i32>,
    #[serde(rename = "median_deficit_acre_feet")]
    pub median_deficit: Option<f64>,
    pub failure_curve: Vec<FailurePoint>,
    pub scenario_results: ScenarioResults,
}

fn default_end_year() -> i32 {
    DEFAULT_END_YEAR
}

impl SimulationResult {
    pub fn is_fail(&self) -> bool {
        self.verdict == Verdict::Fail
    }
}

impl Validate for SimulationResult {
    fn validate(&self) -> Result<()> {
        check_probability("p_failure_by_end_year", self.p_failure_by_end_year)?;
        if let Some(d) = self.median_deficit {
            if !d.is_finite() {
                return Err(Error::Malformed(format!("median deficit is not finite: {d}")));
            }
        }
        let mut last_year = None;
        for point in &self.failure_curve {
            check_probability("failure curve p_failure", point.p_failure)?;
            if let Some(prev) = last_year {
                if point.year <= prev {
                    return Err(Error::Malformed(format!(
                        "failure curve not ordered: {} after {}",
                        point.year, prev
                    )));
                }
            }
            last_year = Some(point.year);
        }
        Ok(())
    }
}

/// Response of the job status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default, alias = "result")]
    pub results: Option<SimulationResult>,
}

impl Validate for JobStatusResponse {
    fn validate(&self) -> Result<()> {
        match (&self.status, &self.results) {
            (JobStatus::Complete, None) => Err(Error::Malformed(
                "job is complete but carries no result".into(),
            )),
            (_, Some(result)) => result.validate(),
            _ => Ok(()),
        }
    }
}

/// The adjustable project parameters explored in what-if mode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LeverSet {
    /// Fraction of homes removed from the plan, `0.0..=1.0`.
    pub unit_reduction_pct: f64,
    pub greywater_recycling: bool,
    pub pipeline_added: bool,
    pub build_delay_years: u32,
}

impl LeverSet {
    /// Lever set that reproduces the project as originally submitted.
    pub fn reference(greywater_recycling: bool, pipeline_added: bool) -> Self {
        Self {
            unit_reduction_pct: 0.0,
            greywater_recycling,
            pipeline_added,
            build_delay_years: 0,
        }
    }

    /// Plain-English labels for the levers that are pulled.
    pub fn describe(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.unit_reduction_pct > 0.0 {
            out.push(format!(
                "Reduce units by {}%",
                (self.unit_reduction_pct * 100.0).round()
            ));
        }
        if self.greywater_recycling {
            out.push("Add greywater recycling".to_string());
        }
        if self.pipeline_added {
            out.push("Add pipeline / water rights".to_string());
        }
        if self.build_delay_years > 0 {
            let plural = if self.build_delay_years > 1 { "s" } else { "" };
            out.push(format!(
                "Delay build by {} year{plural}",
                self.build_delay_years
            ));
        }
        out
    }
}

impl Validate for LeverSet {
    fn validate(&self) -> Result<()> {
        let r = self.unit_reduction_pct;
        if r.is_finite() && (0.0..=1.0).contains(&r) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "unit reduction must be between 0 and 1, got {r}"
            )))
        }
    }
}

/// Lever values suggested by a recommendation; unset fields are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecommendedLevers {
    #[serde(default)]
    pub unit_reduction_pct: Option<f64>,
    #[serde(default)]
    pub greywater_recycling: Option<bool>,
    #[serde(default)]
    pub pipeline_added: Option<bool>,
    #[serde(default)]
    pub build_delay_years: Option<u32>,
}

impl RecommendedLevers {
    /// Overlays the suggested values on `base`.
    pub fn apply_to(&self, base: &LeverSet) -> LeverSet {
        LeverSet {
            unit_reduction_pct: self.unit_reduction_pct.unwrap_or(base.unit_reduction_pct),
            greywater_recycling: self.greywater_recycling.unwrap_or(base.greywater_recycling),
            pipeline_added: self.pipeline_added.unwrap_or(base.pipeline_added),
            build_delay_years: self.build_delay_years.unwrap_or(base.build_delay_years),
        }
    }
}

/// A single ranked intervention path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rank: u32,
    pub levers: RecommendedLevers,
    pub projected_verdict: Verdict,
    pub projected_p_failure: f64,
    pub explanation: String,
}

/// Ranked recommendations for a failing project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    #[serde(rename = "recommendations")]
    pub items: Vec<Recommendation>,
    #[serde(default)]
    pub unfixable: bool,
    #[serde(default)]
    pub unfixable_reason: Option<String>,
}

impl RecommendationSet {
    /// Looks up a recommendation by its rank.
    pub fn by_rank(&self, rank: u32) -> Option<&Recommendation> {
        self.items.iter().find(|r| r.rank == rank)
    }

    /// Sorts the items by ascending rank.
    pub fn sort_by_rank(&mut self) {
        self.items.sort_by_key(|r| r.rank);
    }
}

impl Validate for RecommendationSet {
    fn validate(&self) -> Result<()> {
        let mut ranks = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if item.rank == 0 {
                return Err(Error::Malformed("recommendation rank must start at 1".into()));
            }
            if ranks.contains(&item.rank) {
                return Err(Error::Malformed(format!(
                    "duplicate recommendation rank {}",
                    item.rank
                )));
            }
            ranks.push(item.rank);
            check_probability("projected_p_failure", item.projected_p_failure)?;
            if let Some(r) = item.levers.unit_reduction_pct {
                check_probability("recommended unit reduction", r)?;
            }
        }
        Ok(())
    }
}

/// Body of the project creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectCreate {
    pub name: String,
    pub unit_count: u32,
    pub build_year: i32,
    pub parcel_geojson: geojson::Geometry,
    pub greywater_recycling: bool,
    pub pipeline_added: bool,
}

impl Validate for ProjectCreate {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("project name is empty".into()));
        }
        if self.unit_count == 0 {
            return Err(Error::InvalidInput("unit count must be positive".into()));
        }
        if !BUILD_YEARS.contains(&self.build_year) {
            return Err(Error::InvalidInput(format!(
                "build year {} outside {}..={}",
                self.build_year,
                BUILD_YEARS.start(),
                BUILD_YEARS.end()
            )));
        }
        Ok(())
    }
}

/// Project metadata as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub project_name: String,
    pub unit_count: u32,
    pub build_year: i32,
    pub parcel_geojson: serde_json::Value,
    #[serde(default)]
    pub greywater_recycling: bool,
    #[serde(default)]
    pub pipeline_added: bool,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Lever set that leaves the project as submitted.
    pub fn reference_levers(&self) -> LeverSet {
        LeverSet::reference(self.greywater_recycling, self.pipeline_added)
    }

    /// One line header, e.g. `500 units · Build 2028 · Greywater`.
    pub fn summary(&self) -> String {
        let mut s = format!("{} units · Build {}", self.unit_count, self.build_year);
        if self.greywater_recycling {
            s.push_str(" · Greywater");
        }
        if self.pipeline_added {
            s.push_str(" · Pipeline");
        }
        s
    }
}

impl Validate for Project {
    fn validate(&self) -> Result<()> {
        if self.unit_count == 0 {
            return Err(Error::Malformed(format!(
                "project {} has no units",
                self.id
            )));
        }
        Ok(())
    }
}
