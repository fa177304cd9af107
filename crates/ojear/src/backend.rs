//! Visual comparison backends.
//!
//! The runner fans checkpoints out to a [`VisualBackend`], which owns baseline
//! storage and comparison. [`FsBaselineBackend`] keeps baselines as PNG files
//! on disk; a hosted comparison service would implement the same trait over
//! HTTP. Scripted doubles live in [`crate::fake`].

use crate::compare;
use crate::result::{OjearError, OjearResult};
use crate::visual::{Checkpoint, RenderTarget, VisualConfig};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Verdict of comparing one checkpoint against its baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOutcome {
    /// The capture matches the baseline under the requested policy
    Passed,
    /// The capture differs from the baseline
    Mismatch {
        /// Human-readable mismatch summary
        detail: String,
        /// Diff image (PNG, base64) when the backend produced one
        diff_png_base64: Option<String>,
    },
    /// No baseline existed; the capture was accepted as the new baseline
    NewBaseline,
    /// The backend could not be reached or failed mid-comparison.
    ///
    /// Kept distinct from `Mismatch` so infrastructure faults are never
    /// triaged as UI regressions.
    TransportFault {
        /// The underlying fault
        message: String,
    },
}

impl ComparisonOutcome {
    /// Whether the checkpoint passed (a fresh baseline counts as passing)
    #[must_use]
    pub const fn is_passing(&self) -> bool {
        matches!(self, Self::Passed | Self::NewBaseline)
    }

    /// Convert the verdict into a result for callers that treat a mismatch
    /// as a hard failure.
    ///
    /// # Errors
    ///
    /// `VisualMismatch` for a mismatch (a test failure), `TransportError` for
    /// an infrastructure fault.
    pub fn into_result(self, label: &str) -> OjearResult<()> {
        match self {
            Self::Passed | Self::NewBaseline => Ok(()),
            Self::Mismatch { detail, .. } => Err(OjearError::VisualMismatch {
                label: label.to_string(),
                detail,
            }),
            Self::TransportFault { message } => Err(OjearError::TransportError { message }),
        }
    }
}

/// Open comparison session a backend hands out per scenario and target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Backend-assigned session identifier
    pub id: String,
    /// Application under test
    pub app: String,
    /// Scenario the session covers
    pub scenario: String,
    /// Render target description, stable across runs
    pub target: String,
}

impl SessionHandle {
    /// Create a handle with a fresh id
    #[must_use]
    pub fn new(app: impl Into<String>, scenario: impl Into<String>, target: &RenderTarget) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            app: app.into(),
            scenario: scenario.into(),
            target: target.describe(),
        }
    }
}

/// Storage and comparison contract the runner drives.
///
/// One session per (scenario, render target) pair; checkpoints within a
/// session arrive in capture order.
pub trait VisualBackend: Send + Sync {
    /// Open a comparison session for one scenario on one render target
    fn open_session(
        &self,
        config: &VisualConfig,
        app: &str,
        scenario: &str,
        target: &RenderTarget,
    ) -> OjearResult<SessionHandle>;

    /// Compare one checkpoint against its baseline
    fn submit_checkpoint(
        &self,
        handle: &SessionHandle,
        checkpoint: &Checkpoint,
    ) -> OjearResult<ComparisonOutcome>;

    /// Close a session; further submissions for the handle are undefined
    fn close_session(&self, handle: &SessionHandle) -> OjearResult<()>;
}

/// Baseline store on the local filesystem.
///
/// Baselines live under `baseline_dir`, keyed by app, scenario, target, and
/// checkpoint label. A missing baseline is accepted as new; a mismatch writes
/// a red-highlight diff under `diff_dir`.
#[derive(Debug, Clone)]
pub struct FsBaselineBackend {
    baseline_dir: PathBuf,
    diff_dir: PathBuf,
    update_baselines: bool,
}

impl FsBaselineBackend {
    /// Create a backend rooted at a baseline directory; diffs default to a
    /// `diffs` sibling inside it
    #[must_use]
    pub fn new(baseline_dir: impl Into<PathBuf>) -> Self {
        let baseline_dir = baseline_dir.into();
        let diff_dir = baseline_dir.join("diffs");
        Self {
            baseline_dir,
            diff_dir,
            update_baselines: false,
        }
    }

    /// Write diff images to a separate directory
    #[must_use]
    pub fn with_diff_dir(mut self, diff_dir: impl Into<PathBuf>) -> Self {
        self.diff_dir = diff_dir.into();
        self
    }

    /// Overwrite baselines on mismatch instead of failing.
    ///
    /// Intended for intentional UI changes; every overwritten checkpoint
    /// reports `NewBaseline`.
    #[must_use]
    pub const fn with_update_baselines(mut self, update: bool) -> Self {
        self.update_baselines = update;
        self
    }

    fn baseline_path(&self, handle: &SessionHandle, label: &str) -> PathBuf {
        self.baseline_dir.join(format!(
            "{}__{}__{}__{}.png",
            sanitize(&handle.app),
            sanitize(&handle.scenario),
            sanitize(&handle.target),
            sanitize(label)
        ))
    }

    fn diff_path(&self, handle: &SessionHandle, label: &str) -> PathBuf {
        self.diff_dir.join(format!(
            "{}__{}__{}__{}.diff.png",
            sanitize(&handle.app),
            sanitize(&handle.scenario),
            sanitize(&handle.target),
            sanitize(label)
        ))
    }
}

/// Replace path-hostile characters so labels map to stable filenames
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

impl VisualBackend for FsBaselineBackend {
    fn open_session(
        &self,
        _config: &VisualConfig,
        app: &str,
        scenario: &str,
        target: &RenderTarget,
    ) -> OjearResult<SessionHandle> {
        std::fs::create_dir_all(&self.baseline_dir)?;
        let handle = SessionHandle::new(app, scenario, target);
        debug!(
            session = %handle.id,
            scenario = %handle.scenario,
            target = %handle.target,
            "baseline session opened"
        );
        Ok(handle)
    }

    fn submit_checkpoint(
        &self,
        handle: &SessionHandle,
        checkpoint: &Checkpoint,
    ) -> OjearResult<ComparisonOutcome> {
        let path = self.baseline_path(handle, &checkpoint.label);
        if !path.exists() {
            write_atomically(&path, &checkpoint.image.data)?;
            info!(
                label = %checkpoint.label,
                target = %handle.target,
                path = %path.display(),
                "baseline created"
            );
            return Ok(ComparisonOutcome::NewBaseline);
        }

        let baseline = std::fs::read(&path)?;
        let report = compare::compare(&checkpoint.image.data, &baseline, checkpoint.policy)?;
        if report.matches {
            return Ok(ComparisonOutcome::Passed);
        }

        if self.update_baselines {
            write_atomically(&path, &checkpoint.image.data)?;
            info!(
                label = %checkpoint.label,
                target = %handle.target,
                "baseline updated on mismatch"
            );
            return Ok(ComparisonOutcome::NewBaseline);
        }

        let detail = report.summary(checkpoint.policy);
        let diff_png_base64 = match report.diff_image {
            Some(diff) => {
                std::fs::create_dir_all(&self.diff_dir)?;
                let diff_path = self.diff_path(handle, &checkpoint.label);
                write_atomically(&diff_path, &diff)?;
                warn!(
                    label = %checkpoint.label,
                    target = %handle.target,
                    diff = %diff_path.display(),
                    "visual mismatch"
                );
                Some(BASE64.encode(&diff))
            }
            None => None,
        };
        Ok(ComparisonOutcome::Mismatch {
            detail,
            diff_png_base64,
        })
    }

    fn close_session(&self, handle: &SessionHandle) -> OjearResult<()> {
        debug!(session = %handle.id, "baseline session closed");
        Ok(())
    }
}

/// Write through a temp file and rename so readers never see partial PNGs
fn write_atomically(path: &Path, data: &[u8]) -> OjearResult<()> {
    let parent = path.parent().ok_or_else(|| OjearError::TransportError {
        message: format!("baseline path has no parent: {}", path.display()),
    })?;
    let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
