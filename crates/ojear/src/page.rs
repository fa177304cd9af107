//! Page Object layer.
//!
//! A page object is a façade over one logical screen: a bundle of named
//! locators plus the semantic actions and assertions meaningful there. Page
//! objects are plain structs holding a driver reference; there is no
//! inheritance hierarchy. One instance covers one logical page-visit —
//! construct a fresh one after a navigation that changes the active screen,
//! and let the old one drop. No cross-page state is retained.

use crate::assertion::{poll, Check, PollOptions};
use crate::driver::{Driver, Interaction};
use crate::locator::Locator;
use crate::result::OjearResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Pattern matched against a page title or URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    /// Exact string match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Substring match
    Contains(String),
    /// Regular-expression match
    Regex(String),
}

impl Pattern {
    /// Check whether a candidate string matches this pattern
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(pattern) => candidate == pattern,
            Self::Prefix(pattern) => candidate.starts_with(pattern),
            Self::Contains(pattern) => candidate.contains(pattern),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(candidate))
                .unwrap_or(false),
        }
    }

    /// Describe the pattern for diagnostics
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Exact(p) => format!("exactly '{p}'"),
            Self::Prefix(p) => format!("starting with '{p}'"),
            Self::Contains(p) => format!("containing '{p}'"),
            Self::Regex(p) => format!("matching /{p}/"),
        }
    }
}

/// Capability interface for page objects.
///
/// Implementors supply the driver reference and (optionally) a name and a
/// default timing contract; actions and polled assertions are provided.
pub trait PageObject {
    /// Driver this page issues calls through
    fn driver(&self) -> &dyn Driver;

    /// Page name for logging and failure messages
    fn name(&self) -> &str {
        "page"
    }

    /// Default timing contract for this page's assertions.
    ///
    /// Explicit and overridable; the `*_within` assertion variants override
    /// it per call.
    fn poll_options(&self) -> PollOptions {
        PollOptions::default()
    }

    /// Resolve a locator strictly and click it.
    ///
    /// Issues exactly one interaction; does not wait for any resulting
    /// navigation — that is the caller's responsibility via an assertion.
    fn click(&self, locator: &Locator) -> OjearResult<()> {
        let element = locator.resolve_strict(self.driver())?;
        debug!(page = self.name(), target = %locator.describe(), "click");
        self.driver().interact(&element, Interaction::Click)
    }

    /// Resolve a locator strictly and hover it
    fn hover(&self, locator: &Locator) -> OjearResult<()> {
        let element = locator.resolve_strict(self.driver())?;
        debug!(page = self.name(), target = %locator.describe(), "hover");
        self.driver().interact(&element, Interaction::Hover)
    }

    /// Assert the page title matches a pattern within the default budget
    fn assert_title(&self, pattern: &Pattern) -> OjearResult<()> {
        self.assert_title_within(pattern, &self.poll_options())
    }

    /// Assert the page title matches a pattern within an explicit budget
    fn assert_title_within(&self, pattern: &Pattern, options: &PollOptions) -> OjearResult<()> {
        let driver = self.driver();
        poll(
            || {
                let title = driver.title()?;
                if pattern.matches(&title) {
                    Ok(Check::Holds)
                } else {
                    Ok(Check::pending(format!("title was '{title}'")))
                }
            },
            options,
        )
        .into_result()
    }

    /// Assert the page URL matches a pattern within the default budget
    fn assert_url(&self, pattern: &Pattern) -> OjearResult<()> {
        self.assert_url_within(pattern, &self.poll_options())
    }

    /// Assert the page URL matches a pattern within an explicit budget
    fn assert_url_within(&self, pattern: &Pattern, options: &PollOptions) -> OjearResult<()> {
        let driver = self.driver();
        poll(
            || {
                let url = driver.current_url()?;
                if pattern.matches(&url) {
                    Ok(Check::Holds)
                } else {
                    Ok(Check::pending(format!("url was '{url}'")))
                }
            },
            options,
        )
        .into_result()
    }

    /// Assert an element becomes visible within the default budget.
    ///
    /// An element that has not appeared yet is transient state and is
    /// retried; a driver fault during the check is not.
    fn assert_visible(&self, locator: &Locator) -> OjearResult<()> {
        self.assert_visible_within(locator, &self.poll_options())
    }

    /// Assert an element becomes visible within an explicit budget
    fn assert_visible_within(&self, locator: &Locator, options: &PollOptions) -> OjearResult<()> {
        let driver = self.driver();
        poll(
            || match locator.resolve(driver)?.first() {
                None => Ok(Check::pending(format!("{} not present", locator.describe()))),
                Some(element) => {
                    if driver.is_visible(element)? {
                        Ok(Check::Holds)
                    } else {
                        Ok(Check::pending(format!(
                            "{} still hidden",
                            locator.describe()
                        )))
                    }
                }
            },
            options,
        )
        .into_result()
    }

    /// Assert an element is absent or hidden within the default budget
    fn assert_not_visible(&self, locator: &Locator) -> OjearResult<()> {
        self.assert_not_visible_within(locator, &self.poll_options())
    }

    /// Assert an element is absent or hidden within an explicit budget
    fn assert_not_visible_within(
        &self,
        locator: &Locator,
        options: &PollOptions,
    ) -> OjearResult<()> {
        let driver = self.driver();
        poll(
            || match locator.resolve(driver)?.first() {
                None => Ok(Check::Holds),
                Some(element) => {
                    if driver.is_visible(element)? {
                        Ok(Check::pending(format!(
                            "{} still visible",
                            locator.describe()
                        )))
                    } else {
                        Ok(Check::Holds)
                    }
                }
            },
            options,
        )
        .into_result()
    }
}

/// A generic page object built from named locators.
///
/// Useful for ad-hoc screens; purpose-built structs implementing
/// [`PageObject`] read better for pages with real semantics.
pub struct GenericPage<'d> {
    driver: &'d dyn Driver,
    name: String,
    locators: HashMap<String, Locator>,
    poll_options: PollOptions,
}

impl std::fmt::Debug for GenericPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericPage")
            .field("name", &self.name)
            .field("locators", &self.locators)
            .finish_non_exhaustive()
    }
}

impl<'d> GenericPage<'d> {
    /// Create a new page over a driver
    pub fn new(driver: &'d dyn Driver, name: impl Into<String>) -> Self {
        Self {
            driver,
            name: name.into(),
            locators: HashMap::new(),
            poll_options: PollOptions::default(),
        }
    }

    /// Register a named locator
    #[must_use]
    pub fn with_locator(mut self, name: impl Into<String>, locator: Locator) -> Self {
        let _ = self.locators.insert(name.into(), locator);
        self
    }

    /// Override the default timing contract for this page
    #[must_use]
    pub fn with_poll_options(mut self, options: PollOptions) -> Self {
        self.poll_options = options;
        self
    }

    /// Look up a registered locator by name
    #[must_use]
    pub fn locator(&self, name: &str) -> Option<&Locator> {
        self.locators.get(name)
    }

    /// Names of all registered locators
    #[must_use]
    pub fn locator_names(&self) -> Vec<&str> {
        self.locators.keys().map(String::as_str).collect()
    }
}

impl PageObject for GenericPage<'_> {
    fn driver(&self) -> &dyn Driver {
        self.driver
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn poll_options(&self) -> PollOptions {
        self.poll_options.clone()
    }
}
