//! Phased scenario execution.
//!
//! A scenario is an ordered list of named steps, each tagged `Act` or
//! `Assert`. An `Act` failure means the scenario never reached the state its
//! assertions describe, so the rest is skipped; `Assert` failures are
//! recorded individually and execution continues, so one run reports every
//! broken expectation. Teardown (closing the visual session, logging the
//! final URL) runs on every exit path.

use crate::driver::{CaptureRegion, Driver};
use crate::result::OjearResult;
use crate::visual::{MatchPolicy, VisualSession};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Which contract a step carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Drives the UI toward a state; failure aborts the scenario
    Act,
    /// Verifies the state; failure is recorded, execution continues
    Assert,
    /// Session cleanup after the steps; failure is recorded
    Teardown,
}

impl Phase {
    /// Name of the phase for reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Act => "act",
            Self::Assert => "assert",
            Self::Teardown => "teardown",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution context handed to each step.
///
/// Carries the driver and, when the scenario runs with visual verification,
/// the open session.
pub struct ScenarioCx<'a, 'r> {
    driver: &'a dyn Driver,
    session: Option<&'a mut VisualSession<'r>>,
}

impl std::fmt::Debug for ScenarioCx<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioCx")
            .field("visual", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl ScenarioCx<'_, '_> {
    /// The driver steps act through
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver
    }

    /// Whether this run carries a visual session
    #[must_use]
    pub fn has_visual(&self) -> bool {
        self.session.is_some()
    }

    /// Record a visual checkpoint, when the run carries a session.
    ///
    /// Functional-only runs skip the capture silently; the same scenario code
    /// works with and without visual verification.
    pub fn checkpoint(
        &mut self,
        label: impl Into<String>,
        policy: MatchPolicy,
        region: CaptureRegion,
    ) -> OjearResult<()> {
        match self.session.as_mut() {
            Some(session) => session.checkpoint(label, policy, region),
            None => Ok(()),
        }
    }
}

type StepFn<'s> = Box<dyn FnMut(&mut ScenarioCx<'_, '_>) -> OjearResult<()> + 's>;

struct Step<'s> {
    phase: Phase,
    label: String,
    run: StepFn<'s>,
}

/// One named step failure in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// Phase the failing step carried
    pub phase: Phase,
    /// Step label
    pub step: String,
    /// What went wrong
    pub diagnostic: String,
}

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: String,
    /// Every recorded failure, in step order
    pub failures: Vec<StepFailure>,
    /// Whether an `Act` failure skipped the remaining steps
    pub aborted: bool,
    /// Wall time of the run
    pub duration: Duration,
}

impl ScenarioReport {
    /// Whether the scenario passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure, when any
    #[must_use]
    pub fn first_failure(&self) -> Option<&StepFailure> {
        self.failures.first()
    }
}

/// An ordered, named sequence of `Act` and `Assert` steps
pub struct Scenario<'s> {
    name: String,
    steps: Vec<Step<'s>>,
}

impl std::fmt::Debug for Scenario<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl<'s> Scenario<'s> {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// The scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an `Act` step
    #[must_use]
    pub fn act<F>(mut self, label: impl Into<String>, step: F) -> Self
    where
        F: FnMut(&mut ScenarioCx<'_, '_>) -> OjearResult<()> + 's,
    {
        self.steps.push(Step {
            phase: Phase::Act,
            label: label.into(),
            run: Box::new(step),
        });
        self
    }

    /// Append an `Assert` step
    #[must_use]
    pub fn assert<F>(mut self, label: impl Into<String>, step: F) -> Self
    where
        F: FnMut(&mut ScenarioCx<'_, '_>) -> OjearResult<()> + 's,
    {
        self.steps.push(Step {
            phase: Phase::Assert,
            label: label.into(),
            run: Box::new(step),
        });
        self
    }

    /// Run without visual verification
    pub fn run_functional(self, driver: &dyn Driver) -> ScenarioReport {
        self.execute(driver, None)
    }

    /// Run with visual verification.
    ///
    /// The session must already be open; teardown closes it on every exit
    /// path, including an aborted run.
    pub fn run(self, driver: &dyn Driver, session: &mut VisualSession<'_>) -> ScenarioReport {
        self.execute(driver, Some(session))
    }

    fn execute(
        mut self,
        driver: &dyn Driver,
        mut session: Option<&mut VisualSession<'_>>,
    ) -> ScenarioReport {
        let start = Instant::now();
        let mut failures = Vec::new();
        let mut aborted = false;
        info!(scenario = %self.name, steps = self.steps.len(), "scenario start");

        for step in &mut self.steps {
            let mut cx = ScenarioCx {
                driver,
                session: session.as_deref_mut(),
            };
            match (step.run)(&mut cx) {
                Ok(()) => {}
                Err(fault) => {
                    let diagnostic = fault.to_string();
                    error!(
                        scenario = %self.name,
                        step = %step.label,
                        phase = step.phase.as_str(),
                        diagnostic = %diagnostic,
                        "step failed"
                    );
                    failures.push(StepFailure {
                        phase: step.phase,
                        step: step.label.clone(),
                        diagnostic,
                    });
                    if step.phase == Phase::Act {
                        aborted = true;
                        break;
                    }
                }
            }
        }

        if let Some(session) = session {
            if let Err(fault) = session.close() {
                failures.push(StepFailure {
                    phase: Phase::Teardown,
                    step: "close visual session".to_string(),
                    diagnostic: fault.to_string(),
                });
            }
        }

        match driver.current_url() {
            Ok(url) => info!(scenario = %self.name, url = %url, "scenario finished"),
            Err(fault) => warn!(
                scenario = %self.name,
                error = %fault,
                "could not read final URL"
            ),
        }

        ScenarioReport {
            scenario: self.name,
            failures,
            aborted,
            duration: start.elapsed(),
        }
    }
}
