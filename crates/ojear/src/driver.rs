//! Abstract browser driver contract.
//!
//! The harness never talks to a browser, the network, or the OS directly;
//! everything flows through this trait. A concrete implementation (CDP,
//! WebDriver, an in-process DOM) lives outside the core. The [`crate::fake`]
//! module provides a scripted implementation for hermetic tests.

use crate::locator::Strategy;
use crate::result::OjearResult;
use serde::{Deserialize, Serialize};

/// Opaque reference to a DOM-like element resolved by the driver.
///
/// A reference is only meaningful to the driver that produced it, and only
/// until the next navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    /// Driver-assigned identifier for the element
    pub id: String,
}

impl ElementRef {
    /// Create a new element reference
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Input interaction kinds the harness can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    /// Single primary-button click
    Click,
    /// Pointer hover without a button press
    Hover,
}

impl Interaction {
    /// Name of the interaction for diagnostics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Hover => "hover",
        }
    }
}

impl std::fmt::Display for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Region of the page a screenshot covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureRegion {
    /// The full scrollable page
    FullPage,
    /// A rectangular sub-region in CSS pixels
    SubRegion {
        /// X offset of the top-left corner
        x: u32,
        /// Y offset of the top-left corner
        y: u32,
        /// Region width
        width: u32,
        /// Region height
        height: u32,
    },
}

/// Screenshot data captured by the driver
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Size of the encoded image in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check the screenshot carries data and non-zero dimensions
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.width > 0 && self.height > 0
    }
}

/// Contract the core consumes for all browser work.
///
/// Every failure is a [`crate::OjearError::DriverError`]; the harness decides
/// whether a fault aborts a scenario or merely fails one assertion.
pub trait Driver {
    /// Navigate the active page to a URL
    fn navigate(&self, url: &str) -> OjearResult<()>;

    /// Current URL of the active page
    fn current_url(&self) -> OjearResult<String>;

    /// Resolve a selector against the live DOM.
    ///
    /// Returns every matching element, in document order. An empty result is
    /// not an error at this level.
    fn locate(&self, strategy: &Strategy, value: &str, exact: bool)
        -> OjearResult<Vec<ElementRef>>;

    /// Perform one input interaction on an element
    fn interact(&self, element: &ElementRef, interaction: Interaction) -> OjearResult<()>;

    /// Whether the element is currently visible
    fn is_visible(&self, element: &ElementRef) -> OjearResult<bool>;

    /// Title of the active page
    fn title(&self) -> OjearResult<String>;

    /// Capture a screenshot of the requested region
    fn screenshot(&self, region: &CaptureRegion) -> OjearResult<Screenshot>;
}
