//! Declarative, lazily-resolved element locators.
//!
//! A [`Locator`] is a resolution recipe, not a DOM handle: it never owns
//! elements, and resolving the same locator after a navigation may yield
//! different elements. Resolution happens at use time, never cached.

use crate::driver::{Driver, ElementRef};
use crate::result::{OjearError, OjearResult};
use serde::{Deserialize, Serialize};

/// Selector strategy for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// ARIA role; the locator value is the accessible name
    Role(String),
    /// Visible text content
    Text,
    /// `data-testid` attribute
    TestId,
    /// CSS selector
    Css,
    /// Image alt text
    AltText,
}

impl Strategy {
    /// Short name of the strategy for diagnostics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role(_) => "role",
            Self::Text => "text",
            Self::TestId => "test-id",
            Self::Css => "css",
            Self::AltText => "alt-text",
        }
    }
}

/// A declarative description of how to find UI element(s).
///
/// Immutable once constructed; builders return new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    strategy: Strategy,
    value: String,
    exact: bool,
}

impl Locator {
    /// Locate by ARIA role and accessible name, e.g. `by_role("link", "Get started")`
    #[must_use]
    pub fn by_role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Role(role.into()),
            value: name.into(),
            exact: false,
        }
    }

    /// Locate by visible text content
    #[must_use]
    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Text,
            value: text.into(),
            exact: false,
        }
    }

    /// Locate by `data-testid` attribute
    #[must_use]
    pub fn by_test_id(id: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::TestId,
            value: id.into(),
            exact: true,
        }
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn by_css(selector: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Css,
            value: selector.into(),
            exact: false,
        }
    }

    /// Locate by image alt text
    #[must_use]
    pub fn by_alt_text(text: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::AltText,
            value: text.into(),
            exact: false,
        }
    }

    /// Require (or relax) whole-value matching. Pure builder, no side effect.
    #[must_use]
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Get the selector strategy
    #[must_use]
    pub const fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Get the selector value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether whole-value matching is required
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.exact
    }

    /// Human-readable description for diagnostics
    #[must_use]
    pub fn describe(&self) -> String {
        let exactness = if self.exact { " (exact)" } else { "" };
        match &self.strategy {
            Strategy::Role(role) => format!("role '{role}' named '{}'{exactness}", self.value),
            _ => format!("{} '{}'{exactness}", self.strategy.as_str(), self.value),
        }
    }

    /// Resolve against the live DOM.
    ///
    /// Returns all matching elements; zero matches is not an error here.
    /// Resolution failures from the driver propagate as driver faults.
    pub fn resolve(&self, driver: &dyn Driver) -> OjearResult<Vec<ElementRef>> {
        driver.locate(&self.strategy, &self.value, self.exact)
    }

    /// Resolve to exactly one element, as actions require.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when nothing matches; `AmbiguousLocator` when
    /// exactness was required and more than one element matches.
    pub fn resolve_strict(&self, driver: &dyn Driver) -> OjearResult<ElementRef> {
        let mut matches = self.resolve(driver)?;
        match matches.len() {
            0 => Err(OjearError::ElementNotFound {
                strategy: self.strategy.as_str().to_string(),
                value: self.value.clone(),
            }),
            1 => Ok(matches.remove(0)),
            n if self.exact => Err(OjearError::AmbiguousLocator {
                strategy: self.strategy.as_str().to_string(),
                value: self.value.clone(),
                count: n,
            }),
            // Non-exact locators take the first match in document order.
            _ => Ok(matches.remove(0)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fake::{FakeDriver, FakeElement, PageState};

    mod builder_tests {
        use super::*;

        #[test]
        fn test_by_role_carries_name() {
            let locator = Locator::by_role("link", "Get started");
            assert!(matches!(locator.strategy(), Strategy::Role(r) if r == "link"));
            assert_eq!(locator.value(), "Get started");
            assert!(!locator.is_exact());
        }

        #[test]
        fn test_by_test_id_is_exact_by_default() {
            let locator = Locator::by_test_id("score");
            assert!(locator.is_exact());
        }

        #[test]
        fn test_exact_is_pure_builder() {
            let base = Locator::by_text("Java");
            let exact = base.clone().exact(true);
            assert!(!base.is_exact());
            assert!(exact.is_exact());
            assert_eq!(base.value(), exact.value());
        }

        #[test]
        fn test_describe_names_strategy_and_value() {
            let locator = Locator::by_text("Java").exact(true);
            let desc = locator.describe();
            assert!(desc.contains("text"));
            assert!(desc.contains("Java"));
            assert!(desc.contains("exact"));
        }

        #[test]
        fn test_describe_role_includes_accessible_name() {
            let desc = Locator::by_role("button", "Node.js").describe();
            assert!(desc.contains("button"));
            assert!(desc.contains("Node.js"));
        }
    }

    mod resolution_tests {
        use super::*;

        fn driver_with(elements: Vec<FakeElement>) -> FakeDriver {
            FakeDriver::new(PageState {
                url: "https://example.test/".to_string(),
                title: "Example".to_string(),
                elements,
            })
        }

        #[test]
        fn test_resolve_returns_all_matches() {
            let driver = driver_with(vec![
                FakeElement::text("e1", "Java tooling"),
                FakeElement::text("e2", "Java runtime"),
            ]);
            let found = Locator::by_text("Java").resolve(&driver).unwrap();
            assert_eq!(found.len(), 2);
        }

        #[test]
        fn test_resolve_empty_is_ok() {
            let driver = driver_with(vec![]);
            let found = Locator::by_text("Java").resolve(&driver).unwrap();
            assert!(found.is_empty());
        }

        #[test]
        fn test_resolve_strict_zero_matches_is_element_not_found() {
            let driver = driver_with(vec![]);
            let err = Locator::by_text("Java").resolve_strict(&driver).unwrap_err();
            assert!(matches!(err, OjearError::ElementNotFound { .. }));
        }

        #[test]
        fn test_resolve_strict_exact_ambiguity_is_error() {
            let driver = driver_with(vec![
                FakeElement::text("e1", "Java"),
                FakeElement::text("e2", "Java"),
            ]);
            let err = Locator::by_text("Java")
                .exact(true)
                .resolve_strict(&driver)
                .unwrap_err();
            assert!(matches!(err, OjearError::AmbiguousLocator { count: 2, .. }));
        }

        #[test]
        fn test_resolve_strict_non_exact_takes_first() {
            let driver = driver_with(vec![
                FakeElement::text("e1", "Java tooling"),
                FakeElement::text("e2", "Java runtime"),
            ]);
            let element = Locator::by_text("Java").resolve_strict(&driver).unwrap();
            assert_eq!(element.id, "e1");
        }

        #[test]
        fn test_exact_matching_excludes_substrings() {
            let driver = driver_with(vec![FakeElement::text("e1", "Installing Java")]);
            let found = Locator::by_text("Java").exact(true).resolve(&driver).unwrap();
            assert!(found.is_empty());
        }

        #[test]
        fn test_same_locator_resolves_differently_across_navigations() {
            let driver = driver_with(vec![FakeElement::text("e1", "Get started")]);
            let locator = Locator::by_text("Get started");
            assert_eq!(locator.resolve(&driver).unwrap().len(), 1);

            driver.register_site(
                "https://example.test/intro",
                PageState {
                    url: "https://example.test/intro".to_string(),
                    title: "Intro".to_string(),
                    elements: vec![],
                },
            );
            driver.navigate("https://example.test/intro").unwrap();
            assert!(locator.resolve(&driver).unwrap().is_empty());
        }
    }
}
