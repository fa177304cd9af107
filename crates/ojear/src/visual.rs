//! Visual checkpoint capture and session orchestration.
//!
//! A [`VisualSession`] covers one scenario: open it, record checkpoints at
//! interesting moments, close it. Captured checkpoints queue locally and are
//! flushed to the [`crate::runner::Runner`] on close, which fans them out
//! across the configured render targets.

use crate::driver::{CaptureRegion, Driver, Screenshot};
use crate::result::{OjearError, OjearResult};
use crate::runner::{Runner, SessionSubmission};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Groups related test runs under one reporting umbrella
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    name: String,
    id: String,
}

impl Batch {
    /// Create a batch with a fresh unique id
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Human-readable batch name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique batch identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Browser engine a grid target renders in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowserKind {
    /// Chromium-based
    Chrome,
    /// Gecko-based
    Firefox,
    /// WebKit-based
    Safari,
    /// Chromium-based Edge
    Edge,
}

impl BrowserKind {
    /// Name of the browser for target descriptions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
            Self::Edge => "edge",
        }
    }
}

/// Screen orientation for device emulation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Height exceeds width
    Portrait,
    /// Width exceeds height
    Landscape,
}

impl Orientation {
    /// Name of the orientation for target descriptions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }
}

/// One environment a checkpoint is verified against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderTarget {
    /// The locally running browser at the session viewport
    Local {
        /// Viewport width in CSS pixels
        width: u32,
        /// Viewport height in CSS pixels
        height: u32,
    },
    /// A desktop browser at a fixed viewport
    Browser {
        /// Viewport width in CSS pixels
        width: u32,
        /// Viewport height in CSS pixels
        height: u32,
        /// Browser engine
        kind: BrowserKind,
    },
    /// An emulated mobile device
    Device {
        /// Device preset name, e.g. `"iPhone 11"`
        name: String,
        /// Screen orientation
        orientation: Orientation,
    },
}

impl RenderTarget {
    /// Stable description used in reports and baseline paths
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Local { width, height } => format!("local {width}x{height}"),
            Self::Browser {
                width,
                height,
                kind,
            } => format!("{} {width}x{height}", kind.as_str()),
            Self::Device { name, orientation } => {
                format!("device {name} {}", orientation.as_str())
            }
        }
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Tolerance rule applied when a checkpoint is compared to its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Pixel-level equivalence
    Exact,
    /// Structure must match; content and colors may differ within blocks
    LayoutOnly,
    /// Structure and text must match; colors may differ
    IgnoreColors,
}

impl MatchPolicy {
    /// Name of the policy for diagnostics and reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::LayoutOnly => "layout-only",
            Self::IgnoreColors => "ignore-colors",
        }
    }
}

/// Settings shared by every session a runner executes
#[derive(Clone)]
pub struct VisualConfig {
    api_key: String,
    batch: Batch,
    viewport_matrix: Vec<RenderTarget>,
}

impl std::fmt::Debug for VisualConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualConfig")
            .field("api_key", &"***")
            .field("batch", &self.batch)
            .field("viewport_matrix", &self.viewport_matrix)
            .finish()
    }
}

impl VisualConfig {
    /// Environment variable the credential is read from by [`Self::from_env`]
    pub const API_KEY_VAR: &'static str = "OJEAR_API_KEY";

    /// Create a configuration with an explicit credential.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when the credential is empty or whitespace.
    /// Validation happens here, before any browser work starts.
    pub fn new(api_key: impl Into<String>, batch: Batch) -> OjearResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(OjearError::ConfigurationMissing {
                message: "visual API key is empty; set it explicitly or via OJEAR_API_KEY"
                    .to_string(),
            });
        }
        Ok(Self {
            api_key,
            batch,
            viewport_matrix: Vec::new(),
        })
    }

    /// Create a configuration reading the credential from `OJEAR_API_KEY`.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when the variable is unset or blank.
    pub fn from_env(batch: Batch) -> OjearResult<Self> {
        let api_key =
            std::env::var(Self::API_KEY_VAR).map_err(|_| OjearError::ConfigurationMissing {
                message: format!("environment variable {} is not set", Self::API_KEY_VAR),
            })?;
        Self::new(api_key, batch)
    }

    /// Add a desktop browser target to the viewport matrix
    #[must_use]
    pub fn add_browser(mut self, width: u32, height: u32, kind: BrowserKind) -> Self {
        self.viewport_matrix.push(RenderTarget::Browser {
            width,
            height,
            kind,
        });
        self
    }

    /// Add an emulated device target to the viewport matrix
    #[must_use]
    pub fn add_device_emulation(
        mut self,
        name: impl Into<String>,
        orientation: Orientation,
    ) -> Self {
        self.viewport_matrix.push(RenderTarget::Device {
            name: name.into(),
            orientation,
        });
        self
    }

    /// The configured credential
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The batch runs are grouped under
    #[must_use]
    pub const fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Targets a grid runner fans each checkpoint out to
    #[must_use]
    pub fn viewport_matrix(&self) -> &[RenderTarget] {
        &self.viewport_matrix
    }
}

/// One captured verification point: a label, an image, and the rule for
/// judging it
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// Label identifying the checkpoint within the scenario
    pub label: String,
    /// Tolerance rule for baseline comparison
    pub policy: MatchPolicy,
    /// Region of the page that was captured
    pub region: CaptureRegion,
    /// The captured image
    pub image: Screenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Unopened,
    Open,
    Closed,
}

impl SessionState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Visual verification lifecycle for one scenario.
///
/// State machine: unopened, open, closed. Checkpoints are accepted only while
/// open; close is idempotent. A session is never reopened.
pub struct VisualSession<'a> {
    runner: &'a Runner,
    driver: &'a dyn Driver,
    app_name: String,
    scenario: String,
    viewport: Viewport,
    state: SessionState,
    queued: Vec<Checkpoint>,
}

impl std::fmt::Debug for VisualSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualSession")
            .field("app_name", &self.app_name)
            .field("scenario", &self.scenario)
            .field("viewport", &self.viewport)
            .field("state", &self.state)
            .field("queued", &self.queued.len())
            .finish()
    }
}

impl<'a> VisualSession<'a> {
    /// Create an unopened session bound to a runner and driver
    #[must_use]
    pub fn new(runner: &'a Runner, driver: &'a dyn Driver, app_name: impl Into<String>) -> Self {
        Self {
            runner,
            driver,
            app_name: app_name.into(),
            scenario: String::new(),
            viewport: Viewport::new(0, 0),
            state: SessionState::Unopened,
            queued: Vec::new(),
        }
    }

    /// The driver this session captures through
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver
    }

    /// Whether the session currently accepts checkpoints
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Open the session for a named scenario at a viewport.
    ///
    /// # Errors
    ///
    /// `SessionNotActive` when the session was already opened; a session
    /// covers exactly one scenario and is never reopened.
    pub fn open(&mut self, scenario: impl Into<String>, viewport: Viewport) -> OjearResult<()> {
        if self.state != SessionState::Unopened {
            return Err(OjearError::SessionNotActive {
                message: format!("cannot open a session that is {}", self.state.as_str()),
            });
        }
        self.scenario = scenario.into();
        self.viewport = viewport;
        self.state = SessionState::Open;
        info!(
            app = %self.app_name,
            scenario = %self.scenario,
            batch = %self.runner.batch().name(),
            "visual session opened"
        );
        Ok(())
    }

    /// Capture a checkpoint and queue it for verification.
    ///
    /// The capture happens now; comparison happens after [`Self::close`]
    /// flushes the queue to the runner.
    ///
    /// # Errors
    ///
    /// `SessionNotActive` when the session is not open; driver faults
    /// propagate from the capture.
    pub fn checkpoint(
        &mut self,
        label: impl Into<String>,
        policy: MatchPolicy,
        region: CaptureRegion,
    ) -> OjearResult<()> {
        let label = label.into();
        if self.state != SessionState::Open {
            return Err(OjearError::SessionNotActive {
                message: format!(
                    "checkpoint '{label}' requested while session is {}",
                    self.state.as_str()
                ),
            });
        }
        let image = self.driver.screenshot(&region)?;
        debug!(
            label = %label,
            policy = policy.as_str(),
            bytes = image.size_bytes(),
            "checkpoint captured"
        );
        self.queued.push(Checkpoint {
            label,
            policy,
            region,
            image,
        });
        Ok(())
    }

    /// Number of checkpoints queued so far
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Close the session and hand queued checkpoints to the runner.
    ///
    /// Closing an already-closed session is a no-op. Closing with zero
    /// checkpoints is clean and contributes nothing to the batch report.
    pub fn close(&mut self) -> OjearResult<()> {
        match self.state {
            SessionState::Closed => Ok(()),
            SessionState::Unopened => {
                self.state = SessionState::Closed;
                Ok(())
            }
            SessionState::Open => {
                self.state = SessionState::Closed;
                let checkpoints = std::mem::take(&mut self.queued);
                info!(
                    scenario = %self.scenario,
                    checkpoints = checkpoints.len(),
                    "visual session closed"
                );
                if checkpoints.is_empty() {
                    return Ok(());
                }
                self.runner.submit_session(SessionSubmission {
                    app: self.app_name.clone(),
                    scenario: self.scenario.clone(),
                    viewport: self.viewport,
                    checkpoints,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::ComparisonOutcome;
    use crate::fake::{FakeBackend, FakeDriver, PageState};
    use crate::runner::RunnerMode;
    use std::sync::Arc;

    fn test_config() -> VisualConfig {
        VisualConfig::new("key-under-test", Batch::new("unit batch")).unwrap()
    }

    fn test_driver() -> FakeDriver {
        FakeDriver::new(PageState {
            url: "https://example.test/".to_string(),
            title: "Example".to_string(),
            elements: vec![],
        })
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_empty_api_key_rejected_before_any_browser_work() {
            let err = VisualConfig::new("", Batch::new("b")).unwrap_err();
            assert!(matches!(err, OjearError::ConfigurationMissing { .. }));
        }

        #[test]
        fn test_whitespace_api_key_rejected() {
            let err = VisualConfig::new("   ", Batch::new("b")).unwrap_err();
            assert!(matches!(err, OjearError::ConfigurationMissing { .. }));
        }

        #[test]
        fn test_viewport_matrix_preserves_insertion_order() {
            let config = test_config()
                .add_browser(800, 600, BrowserKind::Chrome)
                .add_device_emulation("iPhone 11", Orientation::Portrait)
                .add_browser(1600, 1200, BrowserKind::Firefox);
            let matrix = config.viewport_matrix();
            assert_eq!(matrix.len(), 3);
            assert_eq!(matrix[0].describe(), "chrome 800x600");
            assert_eq!(matrix[1].describe(), "device iPhone 11 portrait");
            assert_eq!(matrix[2].describe(), "firefox 1600x1200");
        }

        #[test]
        fn test_debug_redacts_api_key() {
            let config = test_config();
            let rendered = format!("{config:?}");
            assert!(!rendered.contains("key-under-test"));
        }

        #[test]
        fn test_batch_ids_are_unique() {
            assert_ne!(Batch::new("a").id(), Batch::new("a").id());
        }
    }

    mod session_tests {
        use super::*;

        fn classic_runner(backend: Arc<FakeBackend>) -> Runner {
            Runner::new(test_config(), RunnerMode::Classic, backend).unwrap()
        }

        #[test]
        fn test_checkpoint_before_open_is_session_not_active() {
            let backend = Arc::new(FakeBackend::new());
            let runner = classic_runner(backend);
            let driver = test_driver();
            let mut session = VisualSession::new(&runner, &driver, "app");

            let err = session
                .checkpoint("home", MatchPolicy::Exact, CaptureRegion::FullPage)
                .unwrap_err();
            assert!(matches!(err, OjearError::SessionNotActive { .. }));
        }

        #[test]
        fn test_checkpoint_after_close_is_session_not_active() {
            let backend = Arc::new(FakeBackend::new());
            let runner = classic_runner(backend);
            let driver = test_driver();
            let mut session = VisualSession::new(&runner, &driver, "app");

            session.open("scenario", Viewport::new(1024, 768)).unwrap();
            session.close().unwrap();
            let err = session
                .checkpoint("late", MatchPolicy::Exact, CaptureRegion::FullPage)
                .unwrap_err();
            assert!(matches!(err, OjearError::SessionNotActive { .. }));
        }

        #[test]
        fn test_double_close_is_noop() {
            let backend = Arc::new(FakeBackend::new());
            let runner = classic_runner(Arc::clone(&backend));
            let driver = test_driver();
            let mut session = VisualSession::new(&runner, &driver, "app");

            session.open("scenario", Viewport::new(1024, 768)).unwrap();
            session
                .checkpoint("home", MatchPolicy::Exact, CaptureRegion::FullPage)
                .unwrap();
            session.close().unwrap();
            session.close().unwrap();

            let results = runner.collect_results();
            assert_eq!(results.len(), 1);
        }

        #[test]
        fn test_reopen_is_rejected() {
            let backend = Arc::new(FakeBackend::new());
            let runner = classic_runner(backend);
            let driver = test_driver();
            let mut session = VisualSession::new(&runner, &driver, "app");

            session.open("scenario", Viewport::new(1024, 768)).unwrap();
            session.close().unwrap();
            let err = session.open("again", Viewport::new(1024, 768)).unwrap_err();
            assert!(matches!(err, OjearError::SessionNotActive { .. }));
        }

        #[test]
        fn test_zero_checkpoint_session_closes_clean_and_contributes_nothing() {
            let backend = Arc::new(FakeBackend::new());
            let runner = classic_runner(Arc::clone(&backend));
            let driver = test_driver();
            let mut session = VisualSession::new(&runner, &driver, "app");

            session.open("scenario", Viewport::new(1024, 768)).unwrap();
            session.close().unwrap();

            assert!(runner.collect_results().is_empty());
            assert_eq!(backend.opened(), 0);
        }

        #[test]
        fn test_checkpoints_submit_in_capture_order() {
            let backend = Arc::new(FakeBackend::new());
            let runner = classic_runner(Arc::clone(&backend));
            let driver = test_driver();
            let mut session = VisualSession::new(&runner, &driver, "app");

            session.open("scenario", Viewport::new(1024, 768)).unwrap();
            session
                .checkpoint("first", MatchPolicy::Exact, CaptureRegion::FullPage)
                .unwrap();
            session
                .checkpoint("second", MatchPolicy::LayoutOnly, CaptureRegion::FullPage)
                .unwrap();
            session.close().unwrap();

            let results = runner.collect_results();
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].label, "first");
            assert_eq!(results[1].label, "second");
            assert_eq!(results[0].outcome, ComparisonOutcome::Passed);
        }

        #[test]
        fn test_capture_failure_propagates_and_queues_nothing() {
            let backend = Arc::new(FakeBackend::new());
            let runner = classic_runner(backend);
            let driver = test_driver();
            driver.fail_all(true);
            let mut session = VisualSession::new(&runner, &driver, "app");

            session.open("scenario", Viewport::new(1024, 768)).unwrap();
            let err = session
                .checkpoint("home", MatchPolicy::Exact, CaptureRegion::FullPage)
                .unwrap_err();
            assert!(matches!(err, OjearError::DriverError { .. }));
            assert_eq!(session.queued_count(), 0);
        }
    }
}
