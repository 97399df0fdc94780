//! Typed element locators.
//!
//! A [`Locator`] is an immutable `(strategy, value)` pair. Its canonical key
//! (`"xpath=//button[@id='old']"`) is what the healed-locator cache is keyed
//! by, and the same notation parses back through [`FromStr`].
//!
//! Repair candidates arrive from the oracle as free text; they are decoded
//! once, here, by [`Locator::from_candidate`]. Anything without a recognised
//! strategy wrapper is treated as an XPath.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::result::{HealError, HealResult};

/// Locator strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `id` attribute equality
    Id,
    /// `name` attribute equality
    Name,
    /// CSS selector
    Css,
    /// Single class name
    Class,
    /// Tag name
    Tag,
    /// Exact anchor text
    LinkText,
    /// Anchor text substring
    PartialLinkText,
    /// XPath expression
    XPath,
}

impl Strategy {
    /// All strategies, in declaration order
    pub const ALL: [Self; 8] = [
        Self::Id,
        Self::Name,
        Self::Css,
        Self::Class,
        Self::Tag,
        Self::LinkText,
        Self::PartialLinkText,
        Self::XPath,
    ];

    /// Name used in canonical keys
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Css => "css",
            Self::Class => "class",
            Self::Tag => "tag",
            Self::LinkText => "link_text",
            Self::PartialLinkText => "partial_link_text",
            Self::XPath => "xpath",
        }
    }

    /// Parse a strategy name, tolerating the spellings drivers use
    /// (`cssSelector`, `class name`, `By.linkText`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "css" | "cssselector" | "selector" => Some(Self::Css),
            "class" | "classname" => Some(Self::Class),
            "tag" | "tagname" => Some(Self::Tag),
            "linktext" | "link" => Some(Self::LinkText),
            "partiallinktext" | "partiallink" => Some(Self::PartialLinkText),
            "xpath" => Some(Self::XPath),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An element locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    strategy: Strategy,
    value: String,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// `id` locator
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self::new(Strategy::Id, value)
    }

    /// `name` locator
    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self::new(Strategy::Name, value)
    }

    /// CSS selector locator
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(Strategy::Css, value)
    }

    /// Class name locator
    #[must_use]
    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(Strategy::Class, value)
    }

    /// Tag name locator
    #[must_use]
    pub fn tag(value: impl Into<String>) -> Self {
        Self::new(Strategy::Tag, value)
    }

    /// Exact link text locator
    #[must_use]
    pub fn link_text(value: impl Into<String>) -> Self {
        Self::new(Strategy::LinkText, value)
    }

    /// Partial link text locator
    #[must_use]
    pub fn partial_link_text(value: impl Into<String>) -> Self {
        Self::new(Strategy::PartialLinkText, value)
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    /// The strategy
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The raw value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Canonical cache key: `<strategy>=<value>`
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}={}", self.strategy, self.value)
    }

    /// Decode a repair candidate returned by the oracle.
    ///
    /// Recognises `by id(foo)`, `By.id: foo`, `by css selector("a.b")` and
    /// canonical `id=foo` keys. Unknown or garbled prefixes fall back to
    /// treating the whole (trimmed) string as an XPath.
    #[must_use]
    pub fn from_candidate(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(caps) = wrapper_pattern().captures(trimmed) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            if let Some(strategy) = Strategy::from_name(name) {
                let value = unquote(inner.trim());
                if !value.is_empty() {
                    return Self::new(strategy, value);
                }
            }
        } else if let Ok(locator) = trimmed.parse::<Self>() {
            return locator;
        }
        Self::xpath(trimmed)
    }

    /// CSS equivalent for strategies that have one
    #[must_use]
    pub fn to_css(&self) -> Option<String> {
        match self.strategy {
            Strategy::Id => Some(format!("[id=\"{}\"]", css_escape(&self.value))),
            Strategy::Name => Some(format!("[name=\"{}\"]", css_escape(&self.value))),
            Strategy::Class => Some(format!("[class~=\"{}\"]", css_escape(&self.value))),
            Strategy::Css | Strategy::Tag => Some(self.value.clone()),
            Strategy::LinkText | Strategy::PartialLinkText | Strategy::XPath => None,
        }
    }

    /// JavaScript expression that evaluates to an array of matching elements
    #[must_use]
    pub fn to_query(&self) -> String {
        let value = serde_json::to_string(&self.value).unwrap_or_else(|_| "\"\"".to_string());
        match self.strategy {
            Strategy::XPath => format!(
                "(() => {{ const r = document.evaluate({value}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); return out; }})()"
            ),
            Strategy::LinkText => format!(
                "Array.from(document.querySelectorAll('a')).filter(el => el.textContent.trim() === {value})"
            ),
            Strategy::PartialLinkText => format!(
                "Array.from(document.querySelectorAll('a')).filter(el => el.textContent.includes({value}))"
            ),
            _ => {
                let css = self.to_css().unwrap_or_default();
                let css = serde_json::to_string(&css).unwrap_or_else(|_| "\"\"".to_string());
                format!("Array.from(document.querySelectorAll({css}))")
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}

impl FromStr for Locator {
    type Err = HealError;

    /// Parse `<strategy>=<value>` (the canonical key form)
    fn from_str(s: &str) -> HealResult<Self> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| HealError::invalid_locator(format!("expected strategy=value: {s}")))?;
        let strategy = Strategy::from_name(name.trim())
            .filter(|_| !name.trim().is_empty() && !name.contains(['/', '[', '(']))
            .ok_or_else(|| HealError::invalid_locator(format!("unknown strategy: {name}")))?;
        if value.is_empty() {
            return Err(HealError::invalid_locator(format!("empty value: {s}")));
        }
        Ok(Self::new(strategy, value))
    }
}

fn wrapper_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^by\s*[._]?\s*([a-z][a-z _]*?)\s*(?:\((.*)\)|:\s*(.+))$")
            .unwrap_or_else(|e| panic!("invalid candidate pattern: {e}"))
    })
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Escape a value for use inside a double-quoted CSS attribute selector
#[must_use]
pub fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    mod key_tests {
        use super::*;

        #[test]
        fn test_key_format() {
            assert_eq!(Locator::id("submit-btn").key(), "id=submit-btn");
            assert_eq!(
                Locator::xpath("//button[@id='old']").key(),
                "xpath=//button[@id='old']"
            );
            assert_eq!(Locator::link_text("Home").key(), "link_text=Home");
        }

        #[test]
        fn test_equality_requires_strategy_and_value() {
            assert_eq!(Locator::id("a"), Locator::id("a"));
            assert_ne!(Locator::id("a"), Locator::name("a"));
            assert_ne!(Locator::id("a"), Locator::id("a "));
        }

        #[test]
        fn test_parse_key_roundtrip() {
            for strategy in Strategy::ALL {
                let locator = Locator::new(strategy, "v[1]=x");
                let parsed: Locator = locator.key().parse().unwrap();
                assert_eq!(parsed, locator);
            }
        }

        #[test]
        fn test_parse_rejects_garbage() {
            assert!("nonsense".parse::<Locator>().is_err());
            assert!("bogus=x".parse::<Locator>().is_err());
            assert!("id=".parse::<Locator>().is_err());
        }
    }

    mod candidate_tests {
        use super::*;

        #[test]
        fn test_by_id_wrapper() {
            assert_eq!(Locator::from_candidate("by id(foo)"), Locator::id("foo"));
        }

        #[test]
        fn test_selenium_display_form() {
            assert_eq!(
                Locator::from_candidate("By.cssSelector: div.card > a"),
                Locator::css("div.card > a")
            );
            assert_eq!(
                Locator::from_candidate("By.xpath: //a[@href='/']"),
                Locator::xpath("//a[@href='/']")
            );
        }

        #[test]
        fn test_quoted_inner_value() {
            assert_eq!(
                Locator::from_candidate("By name(\"email\")"),
                Locator::name("email")
            );
            assert_eq!(
                Locator::from_candidate("by link text('Sign in')"),
                Locator::link_text("Sign in")
            );
        }

        #[test]
        fn test_plain_xpath() {
            assert_eq!(
                Locator::from_candidate("  //button[@id='new']\n"),
                Locator::xpath("//button[@id='new']")
            );
        }

        #[test]
        fn test_unknown_prefix_falls_back_to_xpath() {
            let raw = "by magic(foo)";
            assert_eq!(Locator::from_candidate(raw), Locator::xpath(raw));
            let raw = "locate: //div";
            assert_eq!(Locator::from_candidate(raw), Locator::xpath(raw));
        }

        #[test]
        fn test_canonical_key_candidate() {
            assert_eq!(Locator::from_candidate("name=q"), Locator::name("q"));
        }

        #[test]
        fn test_xpath_with_equals_stays_xpath() {
            let raw = "//input[@type='text']";
            assert_eq!(Locator::from_candidate(raw), Locator::xpath(raw));
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_to_css() {
            assert_eq!(Locator::id("a\"b").to_css().unwrap(), "[id=\"a\\\"b\"]");
            assert_eq!(Locator::class_name("btn").to_css().unwrap(), "[class~=\"btn\"]");
            assert_eq!(Locator::tag("form").to_css().unwrap(), "form");
            assert!(Locator::xpath("//a").to_css().is_none());
        }

        #[test]
        fn test_to_query_variants() {
            assert!(Locator::xpath("//a").to_query().contains("document.evaluate"));
            assert!(Locator::link_text("Home")
                .to_query()
                .contains("textContent.trim() === \"Home\""));
            assert!(Locator::id("x").to_query().contains("querySelectorAll"));
        }
    }
}
