//! Scripted doubles for hermetic tests.
//!
//! [`FakeDriver`] simulates a browser as a set of registered page states with
//! optional delayed transitions, so polling behavior is exercised without a
//! real browser. [`FakeBackend`] records submissions and returns scripted
//! comparison outcomes. Both are plain library types so downstream crates can
//! test their own page objects against them.

use crate::backend::{ComparisonOutcome, SessionHandle, VisualBackend};
use crate::driver::{CaptureRegion, Driver, ElementRef, Interaction, Screenshot};
use crate::locator::Strategy;
use crate::result::{OjearError, OjearResult};
use crate::visual::{Checkpoint, MatchPolicy, RenderTarget, VisualConfig};
use image::ImageEncoder;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Encode a solid-color RGBA PNG, for screenshot fixtures
#[must_use]
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            img.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgba8,
        )
        .expect("in-memory PNG encoding cannot fail");
    buffer
}

/// One simulated element on a fake page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    /// Driver-assigned identifier
    pub id: String,
    /// Strategy this element is findable by
    pub strategy: Strategy,
    /// Value matched against locator queries
    pub value: String,
    /// Whether the element renders visibly
    pub visible: bool,
}

impl FakeElement {
    /// An element findable by visible text
    #[must_use]
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            strategy: Strategy::Text,
            value: text.into(),
            visible: true,
        }
    }

    /// An element findable by ARIA role and accessible name
    #[must_use]
    pub fn role(id: impl Into<String>, role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            strategy: Strategy::Role(role.into()),
            value: name.into(),
            visible: true,
        }
    }

    /// An element findable by `data-testid`
    #[must_use]
    pub fn test_id(id: impl Into<String>, test_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            strategy: Strategy::TestId,
            value: test_id.into(),
            visible: true,
        }
    }

    /// Mark the element present in the DOM but not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn matches(&self, strategy: &Strategy, value: &str, exact: bool) -> bool {
        let strategy_ok = match (&self.strategy, strategy) {
            (Strategy::Role(own), Strategy::Role(queried)) => own == queried,
            (Strategy::Text, Strategy::Text)
            | (Strategy::TestId, Strategy::TestId)
            | (Strategy::Css, Strategy::Css)
            | (Strategy::AltText, Strategy::AltText) => true,
            _ => false,
        };
        strategy_ok
            && if exact {
                self.value == value
            } else {
                self.value.contains(value)
            }
    }
}

/// Complete state of one simulated page
#[derive(Debug, Clone)]
pub struct PageState {
    /// Page URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Elements present on the page
    pub elements: Vec<FakeElement>,
}

struct DriverInner {
    current: PageState,
    sites: HashMap<String, PageState>,
    transitions: HashMap<String, (Duration, PageState)>,
    pending: Option<(Instant, PageState)>,
    interactions: Vec<(String, Interaction)>,
    captures: Vec<CaptureRegion>,
    screenshots: HashMap<String, Vec<u8>>,
    fail_all: bool,
}

/// In-memory browser simulation.
///
/// Navigation swaps the current page state for a registered one; interactions
/// can schedule a delayed state change, which polling assertions then pick up.
/// All methods take `&self`, matching the [`Driver`] contract.
pub struct FakeDriver {
    inner: Mutex<DriverInner>,
}

impl std::fmt::Debug for FakeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("FakeDriver")
            .field("url", &inner.current.url)
            .field("interactions", &inner.interactions.len())
            .finish_non_exhaustive()
    }
}

impl FakeDriver {
    /// Create a driver showing the given page
    #[must_use]
    pub fn new(initial: PageState) -> Self {
        Self {
            inner: Mutex::new(DriverInner {
                current: initial,
                sites: HashMap::new(),
                transitions: HashMap::new(),
                pending: None,
                interactions: Vec::new(),
                captures: Vec::new(),
                screenshots: HashMap::new(),
                fail_all: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DriverInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a page state reachable via [`Driver::navigate`]
    pub fn register_site(&self, url: impl Into<String>, state: PageState) {
        let _ = self.lock().sites.insert(url.into(), state);
    }

    /// Schedule a page-state change applied `delay` after any interaction
    /// with the element
    pub fn on_interaction(&self, element_id: impl Into<String>, delay: Duration, state: PageState) {
        let _ = self
            .lock()
            .transitions
            .insert(element_id.into(), (delay, state));
    }

    /// Serve a specific PNG for screenshots taken while the given URL is
    /// active
    pub fn set_screenshot(&self, url: impl Into<String>, png: Vec<u8>) {
        let _ = self.lock().screenshots.insert(url.into(), png);
    }

    /// Make every driver call fail with a driver fault
    pub fn fail_all(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// Interactions performed so far, as (element id, kind) in order
    #[must_use]
    pub fn interactions(&self) -> Vec<(String, Interaction)> {
        self.lock().interactions.clone()
    }

    /// Screenshot captures requested so far
    #[must_use]
    pub fn captures(&self) -> Vec<CaptureRegion> {
        self.lock().captures.clone()
    }

    fn checked(&self) -> OjearResult<MutexGuard<'_, DriverInner>> {
        let mut inner = self.lock();
        if inner.fail_all {
            return Err(OjearError::driver("injected driver fault"));
        }
        settle(&mut inner);
        Ok(inner)
    }
}

/// Apply a pending delayed transition once its deadline passed
fn settle(inner: &mut DriverInner) {
    if let Some((due, _)) = inner.pending {
        if Instant::now() >= due {
            if let Some((_, state)) = inner.pending.take() {
                inner.current = state;
            }
        }
    }
}

impl Driver for FakeDriver {
    fn navigate(&self, url: &str) -> OjearResult<()> {
        let mut inner = self.checked()?;
        let next = match inner.sites.get(url) {
            Some(state) => state.clone(),
            None if inner.current.url == url => inner.current.clone(),
            None => PageState {
                url: url.to_string(),
                title: String::new(),
                elements: Vec::new(),
            },
        };
        inner.pending = None;
        inner.current = next;
        Ok(())
    }

    fn current_url(&self) -> OjearResult<String> {
        Ok(self.checked()?.current.url.clone())
    }

    fn locate(
        &self,
        strategy: &Strategy,
        value: &str,
        exact: bool,
    ) -> OjearResult<Vec<ElementRef>> {
        let inner = self.checked()?;
        Ok(inner
            .current
            .elements
            .iter()
            .filter(|element| element.matches(strategy, value, exact))
            .map(|element| ElementRef::new(element.id.clone()))
            .collect())
    }

    fn interact(&self, element: &ElementRef, interaction: Interaction) -> OjearResult<()> {
        let mut inner = self.checked()?;
        if !inner.current.elements.iter().any(|e| e.id == element.id) {
            return Err(OjearError::driver(format!(
                "stale element reference '{}'",
                element.id
            )));
        }
        inner.interactions.push((element.id.clone(), interaction));
        if let Some((delay, state)) = inner.transitions.get(&element.id).cloned() {
            inner.pending = Some((Instant::now() + delay, state));
        }
        Ok(())
    }

    fn is_visible(&self, element: &ElementRef) -> OjearResult<bool> {
        let inner = self.checked()?;
        Ok(inner
            .current
            .elements
            .iter()
            .find(|e| e.id == element.id)
            .is_some_and(|e| e.visible))
    }

    fn title(&self) -> OjearResult<String> {
        Ok(self.checked()?.current.title.clone())
    }

    fn screenshot(&self, region: &CaptureRegion) -> OjearResult<Screenshot> {
        let mut inner = self.checked()?;
        inner.captures.push(*region);
        let data = inner
            .screenshots
            .get(&inner.current.url)
            .cloned()
            .unwrap_or_else(|| solid_png(16, 16, [255, 255, 255, 255]));
        let (width, height) = image::load_from_memory(&data)
            .map(|img| (img.width(), img.height()))
            .map_err(|e| OjearError::driver(format!("registered screenshot is not a PNG: {e}")))?;
        Ok(Screenshot::new(data, width, height))
    }
}

/// One recorded checkpoint submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Scenario the session covered
    pub scenario: String,
    /// Render target description
    pub target: String,
    /// Checkpoint label
    pub label: String,
    /// Policy the checkpoint requested
    pub policy: MatchPolicy,
}

struct BackendInner {
    default_outcome: ComparisonOutcome,
    scripted: HashMap<String, ComparisonOutcome>,
    submissions: Vec<Submission>,
    opened: usize,
    closed: usize,
    transport_fail: bool,
    delay: Duration,
}

/// Recording backend with scriptable outcomes
pub struct FakeBackend {
    inner: Mutex<BackendInner>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FakeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("FakeBackend")
            .field("submissions", &inner.submissions.len())
            .field("opened", &inner.opened)
            .field("closed", &inner.closed)
            .finish_non_exhaustive()
    }
}

impl FakeBackend {
    /// Create a backend where every checkpoint passes
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BackendInner {
                default_outcome: ComparisonOutcome::Passed,
                scripted: HashMap::new(),
                submissions: Vec::new(),
                opened: 0,
                closed: 0,
                transport_fail: false,
                delay: Duration::ZERO,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Outcome returned for labels without a script
    pub fn set_default_outcome(&self, outcome: ComparisonOutcome) {
        self.lock().default_outcome = outcome;
    }

    /// Script the outcome for one checkpoint label
    pub fn script_outcome(&self, label: impl Into<String>, outcome: ComparisonOutcome) {
        let _ = self.lock().scripted.insert(label.into(), outcome);
    }

    /// Make session opening fail, simulating an unreachable service
    pub fn set_transport_fail(&self, fail: bool) {
        self.lock().transport_fail = fail;
    }

    /// Sleep this long per comparison, for concurrency tests
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// Checkpoints submitted so far, in submission order
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    /// Number of sessions opened
    #[must_use]
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Number of sessions closed
    #[must_use]
    pub fn closed(&self) -> usize {
        self.lock().closed
    }
}

impl VisualBackend for FakeBackend {
    fn open_session(
        &self,
        _config: &VisualConfig,
        app: &str,
        scenario: &str,
        target: &RenderTarget,
    ) -> OjearResult<SessionHandle> {
        let mut inner = self.lock();
        if inner.transport_fail {
            return Err(OjearError::transport("comparison service unreachable"));
        }
        inner.opened += 1;
        Ok(SessionHandle::new(app, scenario, target))
    }

    fn submit_checkpoint(
        &self,
        handle: &SessionHandle,
        checkpoint: &Checkpoint,
    ) -> OjearResult<ComparisonOutcome> {
        let (delay, outcome) = {
            let mut inner = self.lock();
            inner.submissions.push(Submission {
                scenario: handle.scenario.clone(),
                target: handle.target.clone(),
                label: checkpoint.label.clone(),
                policy: checkpoint.policy,
            });
            let outcome = inner
                .scripted
                .get(&checkpoint.label)
                .cloned()
                .unwrap_or_else(|| inner.default_outcome.clone());
            (inner.delay, outcome)
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(outcome)
    }

    fn close_session(&self, _handle: &SessionHandle) -> OjearResult<()> {
        self.lock().closed += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn two_link_page() -> PageState {
        PageState {
            url: "https://example.test/".to_string(),
            title: "Example".to_string(),
            elements: vec![
                FakeElement::role("go", "link", "Get started"),
                FakeElement::text("note", "release notes").hidden(),
            ],
        }
    }

    #[test]
    fn test_locate_respects_strategy_and_exactness() {
        let driver = FakeDriver::new(two_link_page());
        let by_role = driver
            .locate(&Strategy::Role("link".to_string()), "Get started", false)
            .unwrap();
        assert_eq!(by_role.len(), 1);

        let wrong_role = driver
            .locate(&Strategy::Role("button".to_string()), "Get started", false)
            .unwrap();
        assert!(wrong_role.is_empty());

        let partial = driver.locate(&Strategy::Text, "release", false).unwrap();
        assert_eq!(partial.len(), 1);
        let exact = driver.locate(&Strategy::Text, "release", true).unwrap();
        assert!(exact.is_empty());
    }

    #[test]
    fn test_hidden_elements_resolve_but_report_invisible() {
        let driver = FakeDriver::new(two_link_page());
        let found = driver.locate(&Strategy::Text, "release notes", true).unwrap();
        assert_eq!(found.len(), 1);
        assert!(!driver.is_visible(&found[0]).unwrap());
    }

    #[test]
    fn test_delayed_transition_applies_after_deadline() {
        let driver = FakeDriver::new(two_link_page());
        driver.on_interaction(
            "go",
            Duration::from_millis(20),
            PageState {
                url: "https://example.test/intro".to_string(),
                title: "Intro".to_string(),
                elements: vec![],
            },
        );
        driver
            .interact(&ElementRef::new("go"), Interaction::Click)
            .unwrap();
        assert_eq!(driver.current_url().unwrap(), "https://example.test/");
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(driver.current_url().unwrap(), "https://example.test/intro");
    }

    #[test]
    fn test_interacting_with_stale_reference_is_driver_fault() {
        let driver = FakeDriver::new(two_link_page());
        let err = driver
            .interact(&ElementRef::new("gone"), Interaction::Click)
            .unwrap_err();
        assert!(matches!(err, OjearError::DriverError { .. }));
    }

    #[test]
    fn test_screenshot_serves_url_specific_fixture() {
        let driver = FakeDriver::new(two_link_page());
        let fixture = solid_png(4, 4, [1, 2, 3, 255]);
        driver.set_screenshot("https://example.test/", fixture.clone());
        let shot = driver.screenshot(&CaptureRegion::FullPage).unwrap();
        assert_eq!(shot.data, fixture);
        assert_eq!((shot.width, shot.height), (4, 4));
        assert_eq!(driver.captures().len(), 1);
    }

    #[test]
    fn test_backend_scripting_and_recording() {
        let backend = FakeBackend::new();
        backend.script_outcome(
            "broken",
            ComparisonOutcome::Mismatch {
                detail: "differs".to_string(),
                diff_png_base64: None,
            },
        );
        let config = VisualConfig::new("key", crate::visual::Batch::new("b")).unwrap();
        let target = RenderTarget::Local {
            width: 100,
            height: 100,
        };
        let handle = backend.open_session(&config, "app", "s", &target).unwrap();

        let ok = backend
            .submit_checkpoint(
                &handle,
                &Checkpoint {
                    label: "fine".to_string(),
                    policy: MatchPolicy::Exact,
                    region: CaptureRegion::FullPage,
                    image: Screenshot::new(solid_png(4, 4, [0, 0, 0, 255]), 4, 4),
                },
            )
            .unwrap();
        assert_eq!(ok, ComparisonOutcome::Passed);

        let bad = backend
            .submit_checkpoint(
                &handle,
                &Checkpoint {
                    label: "broken".to_string(),
                    policy: MatchPolicy::LayoutOnly,
                    region: CaptureRegion::FullPage,
                    image: Screenshot::new(solid_png(4, 4, [0, 0, 0, 255]), 4, 4),
                },
            )
            .unwrap();
        assert!(matches!(bad, ComparisonOutcome::Mismatch { .. }));

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[1].policy, MatchPolicy::LayoutOnly);
        backend.close_session(&handle).unwrap();
        assert_eq!(backend.closed(), 1);
    }
}
