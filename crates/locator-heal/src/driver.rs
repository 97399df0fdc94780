//! Document driver abstraction.
//!
//! The healer only needs four things from whatever drives the document:
//! element lookup, bulk lookup, the current markup and script execution.
//! [`DocumentDriver`] captures that boundary so a real browser
//! (`ChromiumDriver`, feature `browser`) and the in-memory
//! [`StaticPageDriver`] are interchangeable.

use crate::locator::Locator;
use crate::result::{HealError, HealResult};
use crate::wait::{self, WaitOptions};
use crate::xpath::{normalize_space, ElementQuery, StructuralPathGenerator};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock, RwLock};

/// Attribute holding the scroll offset at which a static element becomes
/// visible
pub const REVEAL_ATTRIBUTE: &str = "data-reveal-at";

/// Element handle returned by lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Element tag name
    pub tag_name: String,
    /// Whitespace-normalized text content
    pub text: String,
    /// Attributes by name
    pub attributes: BTreeMap<String, String>,
    /// Whether the element is rendered and visible
    pub displayed: bool,
    /// Structural path of the element
    pub path: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            text: String::new(),
            attributes: BTreeMap::new(),
            displayed: true,
            path: String::new(),
        }
    }

    /// Attribute value by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Check if element is displayed
    #[must_use]
    pub const fn is_displayed(&self) -> bool {
        self.displayed
    }
}

/// Abstract driver for document automation
///
/// # Implementations
///
/// - `StaticPageDriver` - in-memory document, for tests and offline tooling
/// - `ChromiumDriver` - CDP via chromiumoxide (feature `browser`)
pub trait DocumentDriver: Send + Sync {
    /// All elements matching the locator, in document order
    fn find_elements(&self, locator: &Locator) -> HealResult<Vec<ElementHandle>>;

    /// First element matching the locator
    ///
    /// A miss is reported as `ElementNotFound` without a cause.
    fn find_element(&self, locator: &Locator) -> HealResult<ElementHandle> {
        self.find_elements(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| HealError::not_found(locator.key(), None))
    }

    /// Current serialized document
    fn page_source(&self) -> HealResult<String>;

    /// Execute a script in the document context
    fn execute_script(&self, script: &str) -> HealResult<serde_json::Value>;

    /// Block until the locator resolves or the timeout elapses
    fn wait_for(&self, locator: &Locator, options: &WaitOptions) -> HealResult<ElementHandle> {
        wait::wait_for_element(self, locator, options)
    }
}

// =============================================================================
// STATIC PAGE DRIVER
// =============================================================================

/// In-memory driver over a parsed HTML document
///
/// Markup can be swapped at any time (another thread may do it while a
/// wait is in progress). `window.scrollBy(x, y)` and `window.scrollTo(x, y)`
/// scripts move a virtual vertical offset; elements carrying
/// `data-reveal-at="<px>"` report as not displayed until the offset reaches
/// that value.
#[derive(Debug, Default)]
pub struct StaticPageDriver {
    markup: RwLock<String>,
    scroll_y: Mutex<i64>,
    call_history: Mutex<Vec<String>>,
}

impl StaticPageDriver {
    /// Create a driver over the given markup
    #[must_use]
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: RwLock::new(markup.into()),
            ..Self::default()
        }
    }

    /// Replace the document
    pub fn set_markup(&self, markup: impl Into<String>) {
        let markup = markup.into();
        match self.markup.write() {
            Ok(mut guard) => *guard = markup,
            Err(poisoned) => *poisoned.into_inner() = markup,
        }
    }

    /// Current vertical scroll offset
    #[must_use]
    pub fn scroll_offset(&self) -> i64 {
        *self.scroll_y.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(method))
    }

    /// Number of recorded calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.history().iter().filter(|c| c.starts_with(method)).count()
    }

    fn record(&self, call: String) {
        self.call_history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(call);
    }

    fn snapshot_markup(&self) -> String {
        self.markup
            .read()
            .map_or_else(|p| p.into_inner().clone(), |m| m.clone())
    }

    fn handle_for(&self, element: ElementRef<'_>, scroll_y: i64) -> ElementHandle {
        let value = element.value();
        ElementHandle {
            tag_name: value.name().to_string(),
            text: normalize_space(&element.text().collect::<String>()),
            attributes: value
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            displayed: is_displayed(element, scroll_y),
            path: StructuralPathGenerator::generate(element),
        }
    }
}

impl DocumentDriver for StaticPageDriver {
    fn find_elements(&self, locator: &Locator) -> HealResult<Vec<ElementHandle>> {
        self.record(format!("find_elements:{}", locator.key()));
        let query = ElementQuery::compile(locator)?;
        let document = Html::parse_document(&self.snapshot_markup());
        let scroll_y = self.scroll_offset();
        Ok(query
            .select(&document)
            .into_iter()
            .map(|el| self.handle_for(el, scroll_y))
            .collect())
    }

    fn page_source(&self) -> HealResult<String> {
        self.record("page_source".to_string());
        Ok(self.snapshot_markup())
    }

    fn execute_script(&self, script: &str) -> HealResult<serde_json::Value> {
        self.record(format!("execute_script:{script}"));
        let (by, to) = scroll_patterns();
        let mut offset = self.scroll_y.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(caps) = by.captures(script) {
            *offset = offset.saturating_add(caps[1].parse::<i64>().unwrap_or(0)).max(0);
        } else if let Some(caps) = to.captures(script) {
            *offset = caps[1].parse::<i64>().unwrap_or(0).max(0);
        }
        Ok(serde_json::Value::Null)
    }
}

fn scroll_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |p: &str| {
            Regex::new(p).unwrap_or_else(|e| panic!("invalid scroll pattern {p}: {e}"))
        };
        (
            build(r"scrollBy\(\s*-?\d+\s*,\s*(-?\d+)\s*\)"),
            build(r"scrollTo\(\s*-?\d+\s*,\s*(-?\d+)\s*\)"),
        )
    })
}

fn is_displayed(element: ElementRef<'_>, scroll_y: i64) -> bool {
    const NON_RENDERED: [&str; 7] = ["head", "script", "style", "title", "meta", "link", "template"];

    let mut current = Some(element);
    while let Some(el) = current {
        let value = el.value();
        if NON_RENDERED.contains(&value.name()) || value.attr("hidden").is_some() {
            return false;
        }
        if value.name() == "input" && value.attr("type") == Some("hidden") {
            return false;
        }
        if let Some(style) = value.attr("style") {
            let style: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            if style.contains("display:none") || style.contains("visibility:hidden") {
                return false;
            }
        }
        if let Some(reveal) = value.attr(REVEAL_ATTRIBUTE) {
            if reveal.trim().parse::<i64>().is_ok_and(|at| scroll_y < at) {
                return false;
            }
        }
        current = el.parent().and_then(ElementRef::wrap);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const PAGE: &str = r#"<html><body>
        <form id="login">
            <input name="user" type="text">
            <input name="token" type="hidden">
            <button id="submit" class="btn primary">Sign in</button>
        </form>
        <div style="display: none"><span id="ghost">boo</span></div>
        <footer data-reveal-at="800"><a href="/help">Help</a></footer>
    </body></html>"#;

    mod lookup_tests {
        use super::*;

        #[test]
        fn test_find_element_by_id() {
            let driver = StaticPageDriver::new(PAGE);
            let el = driver.find_element(&Locator::id("submit")).unwrap();
            assert_eq!(el.tag_name, "button");
            assert_eq!(el.text, "Sign in");
            assert_eq!(el.attribute("class"), Some("btn primary"));
            assert_eq!(el.path, "/button[@id='submit']");
            assert!(el.is_displayed());
        }

        #[test]
        fn test_find_elements_in_document_order() {
            let driver = StaticPageDriver::new(PAGE);
            let inputs = driver.find_elements(&Locator::tag("input")).unwrap();
            let names: Vec<_> = inputs.iter().filter_map(|e| e.attribute("name")).collect();
            assert_eq!(names, vec!["user", "token"]);
        }

        #[test]
        fn test_missing_element() {
            let driver = StaticPageDriver::new(PAGE);
            let err = driver.find_element(&Locator::id("nope")).unwrap_err();
            assert!(matches!(err, HealError::ElementNotFound { ref locator, .. } if locator == "id=nope"));
            assert!(driver.find_elements(&Locator::id("nope")).unwrap().is_empty());
        }

        #[test]
        fn test_invalid_locator_is_reported() {
            let driver = StaticPageDriver::new(PAGE);
            assert!(matches!(
                driver.find_element(&Locator::xpath("//*[last()]")),
                Err(HealError::InvalidLocator { .. })
            ));
        }

        #[test]
        fn test_call_history() {
            let driver = StaticPageDriver::new(PAGE);
            let _ = driver.find_elements(&Locator::id("submit"));
            let _ = driver.page_source();
            assert!(driver.was_called("find_elements:id=submit"));
            assert!(driver.was_called("page_source"));
            assert_eq!(driver.call_count("find_elements"), 1);
        }
    }

    mod visibility_tests {
        use super::*;

        #[test]
        fn test_hidden_elements() {
            let driver = StaticPageDriver::new(PAGE);
            assert!(!driver.find_element(&Locator::id("ghost")).unwrap().displayed);
            assert!(!driver.find_element(&Locator::name("token")).unwrap().displayed);
        }

        #[test]
        fn test_reveal_on_scroll() {
            let driver = StaticPageDriver::new(PAGE);
            let help = Locator::link_text("Help");
            assert!(!driver.find_element(&help).unwrap().displayed);

            driver.execute_script("window.scrollBy(0, 400);").unwrap();
            assert!(!driver.find_element(&help).unwrap().displayed);
            driver.execute_script("window.scrollBy(0, 400);").unwrap();
            assert_eq!(driver.scroll_offset(), 800);
            assert!(driver.find_element(&help).unwrap().displayed);

            driver.execute_script("window.scrollTo(0, 0);").unwrap();
            assert_eq!(driver.scroll_offset(), 0);
        }
    }

    mod wait_tests {
        use super::*;

        #[test]
        fn test_wait_sees_late_markup() {
            let driver = Arc::new(StaticPageDriver::new("<html><body></body></html>"));
            let writer = Arc::clone(&driver);
            let handle = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                writer.set_markup(PAGE);
            });
            let options = WaitOptions::new().with_timeout(2_000).with_poll_interval(5);
            let el = driver.wait_for(&Locator::id("submit"), &options).unwrap();
            assert_eq!(el.tag_name, "button");
            handle.join().unwrap();
        }

        #[test]
        fn test_wait_times_out() {
            let driver = StaticPageDriver::new(PAGE);
            let options = WaitOptions::new().with_timeout(20).with_poll_interval(5);
            let err = driver.wait_for(&Locator::id("nope"), &options).unwrap_err();
            assert!(matches!(err, HealError::Timeout { .. }));
        }
    }
}
