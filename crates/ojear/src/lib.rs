//! Ojear: browser-driven UI verification harness
//!
//! Ojear (Spanish: "to eye/glance over") layers functional and visual
//! verification on top of an abstract browser driver: page objects bundle
//! locators and semantic actions, polled assertions turn "eventually true"
//! into a deterministic timeout contract, and visual sessions capture
//! checkpoints that a runner verifies against baselines, either locally or
//! fanned out across a viewport matrix.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     OJEAR Architecture                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌─────────────┐              │
//! │  │ Scenario │──►│ PageObject│──►│ Driver      │  (abstract)  │
//! │  │ Act/     │   │ Locators  │   │ navigate /  │              │
//! │  │ Assert   │   │ + polling │   │ locate /    │              │
//! │  └────┬─────┘   └───────────┘   │ screenshot  │              │
//! │       │                        └─────────────┘              │
//! │       ▼                                                      │
//! │  ┌──────────┐   ┌───────────┐   ┌─────────────┐              │
//! │  │ Visual   │──►│ Runner    │──►│ Backend     │              │
//! │  │ Session  │   │ Classic / │   │ baselines + │              │
//! │  │ (capture)│   │ Grid pool │   │ comparison  │              │
//! │  └──────────┘   └───────────┘   └─────────────┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The driver is a trait; nothing in the core talks to a browser, the
//! network, or the OS directly. [`fake`] ships scripted driver and backend
//! doubles so harness code is testable hermetically.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Polling assertion engine: timeout and interval contract
pub mod assertion;
/// Comparison backends: baseline storage and verdicts
pub mod backend;
/// Match-policy image comparison
pub mod compare;
/// Abstract browser driver contract
pub mod driver;
/// Scripted driver and backend doubles for hermetic tests
pub mod fake;
/// Declarative element locators
pub mod locator;
/// Page Object layer
pub mod page;
/// Suite-level result aggregation
pub mod report;
/// Error taxonomy
pub mod result;
/// Checkpoint execution engine
pub mod runner;
/// Phased scenario execution
pub mod scenario;
/// Visual sessions, configuration, and render targets
pub mod visual;

pub use assertion::{
    poll, Check, PollOptions, PollOutcome, DEFAULT_ASSERT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
};
pub use backend::{ComparisonOutcome, FsBaselineBackend, SessionHandle, VisualBackend};
pub use compare::{compare, DiffReport};
pub use driver::{CaptureRegion, Driver, ElementRef, Interaction, Screenshot};
pub use locator::{Locator, Strategy};
pub use page::{GenericPage, PageObject, Pattern};
pub use report::{Suite, SuiteResults};
pub use result::{OjearError, OjearResult};
pub use runner::{BatchEntry, Runner, RunnerMode, SessionSubmission};
pub use scenario::{Phase, Scenario, ScenarioCx, ScenarioReport, StepFailure};
pub use visual::{
    Batch, BrowserKind, Checkpoint, MatchPolicy, Orientation, RenderTarget, Viewport,
    VisualConfig, VisualSession,
};
