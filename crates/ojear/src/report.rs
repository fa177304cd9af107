//! Suite-level aggregation of scenario reports.

use crate::result::OjearResult;
use crate::scenario::ScenarioReport;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Collects scenario reports for one run of a test suite.
///
/// With `fail_fast` the suite stops accepting meaningful work after the first
/// failed scenario; callers consult [`Suite::should_continue`] between
/// scenarios.
#[derive(Debug)]
pub struct Suite {
    name: String,
    fail_fast: bool,
    reports: Vec<ScenarioReport>,
    started: Instant,
}

impl Suite {
    /// Start a suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!(suite = %name, "suite start");
        Self {
            name,
            fail_fast: false,
            reports: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Stop after the first failed scenario
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// The suite name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record one scenario's report
    pub fn record(&mut self, report: ScenarioReport) {
        if report.passed() {
            info!(
                suite = %self.name,
                scenario = %report.scenario,
                duration_ms = report.duration.as_millis() as u64,
                "scenario passed"
            );
        } else {
            error!(
                suite = %self.name,
                scenario = %report.scenario,
                failures = report.failures.len(),
                aborted = report.aborted,
                "scenario failed"
            );
        }
        self.reports.push(report);
    }

    /// Whether the next scenario should run
    #[must_use]
    pub fn should_continue(&self) -> bool {
        !(self.fail_fast && self.reports.iter().any(|r| !r.passed()))
    }

    /// Close the suite and produce the aggregate results
    #[must_use]
    pub fn finish(self) -> SuiteResults {
        let duration = self.started.elapsed();
        info!(
            suite = %self.name,
            scenarios = self.reports.len(),
            duration_ms = duration.as_millis() as u64,
            "suite finished"
        );
        SuiteResults {
            suite: self.name,
            reports: self.reports,
            duration,
        }
    }
}

/// Aggregate outcome of a suite run
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResults {
    /// Suite name
    pub suite: String,
    /// Scenario reports, in execution order
    pub reports: Vec<ScenarioReport>,
    /// Wall time of the whole run
    pub duration: Duration,
}

impl SuiteResults {
    /// Whether every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }

    /// Number of passing scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    /// Number of failing scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reports.len() - self.passed_count()
    }

    /// The failing reports, in execution order
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioReport> {
        self.reports.iter().filter(|r| !r.passed()).collect()
    }

    /// Serialize the results as pretty JSON for CI artifacts.
    ///
    /// # Errors
    ///
    /// Propagates serialization failures.
    pub fn to_json(&self) -> OjearResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
