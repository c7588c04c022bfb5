//! Fixtures shared by the unit tests.

use crate::model::{
    FailurePoint, ScenarioResults, SimulationResult, Verdict, FAIL_THRESHOLD,
};

/// Result whose failure probability is `p`, so tests can tell results apart.
pub fn sample_result(p: f64) -> SimulationResult {
    let verdict = if p > FAIL_THRESHOLD {
        Verdict::Fail
    } else {
        Verdict::Pass
    };
    SimulationResult {
        verdict,
        p_failure_by_end_year: p,
        end_year: 2077,
        first_failure_year: (verdict == Verdict::Fail).then_some(2040),
        median_deficit: (verdict == Verdict::Fail).then_some(120.0),
        failure_curve: vec![
            FailurePoint {
                year: 2028,
                p_failure: 0.0,
            },
            FailurePoint {
                year: 2077,
                p_failure: p,
            },
        ],
        scenario_results: ScenarioResults {
            baseline: Verdict::Pass,
            moderate_drought: verdict,
            severe_drought: verdict,
            reduced_snowpack: Verdict::Pass,
        },
    }
}
