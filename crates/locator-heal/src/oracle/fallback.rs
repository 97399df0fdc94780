//! Offline repair by structural similarity.
//!
//! Picks the excerpt element that looks most like what the damaged locator
//! described: same tag first, then the number of attribute and text tokens
//! they share, earlier elements winning ties. The replacement follows the
//! same attribute priority the chat oracle is asked to use.

use super::RepairOracle;
use crate::locator::{Locator, Strategy};
use crate::result::HealResult;
use crate::xpath::{
    normalize_space, quote_literal, Predicate, StructuralPathGenerator, XPathQuery,
};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Elements that never make sense as a repair target
const SKIPPED_TAGS: [&str; 9] = [
    "html", "head", "body", "root", "script", "style", "meta", "link", "title",
];

/// Attributes tried after id, name, class and text
const SECONDARY_ATTRIBUTES: [&str; 8] = [
    "placeholder",
    "aria-label",
    "title",
    "alt",
    "type",
    "href",
    "value",
    "role",
];

/// Longest visible text used as a predicate
const MAX_TEXT_LEN: usize = 60;

/// Deterministic, offline repair oracle
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralFallbackOracle;

impl StructuralFallbackOracle {
    /// Create the oracle
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RepairOracle for StructuralFallbackOracle {
    fn repair_one(&self, damaged: &Locator, excerpt: &str) -> HealResult<Option<Locator>> {
        let document = Html::parse_document(excerpt);
        let hint = Hint::from_locator(damaged);
        let candidate = best_match(&document, &hint).map(|el| emit(&document, el, excerpt));
        tracing::debug!(
            damaged = %damaged,
            candidate = ?candidate.as_ref().map(Locator::key),
            "structural fallback proposed replacement"
        );
        Ok(candidate)
    }

    fn repair_many(&self, damaged: &[Locator], excerpt: &str) -> HealResult<Vec<Option<Locator>>> {
        damaged
            .iter()
            .map(|locator| self.repair_one(locator, excerpt))
            .collect()
    }
}

/// What the damaged locator tells us about its target
#[derive(Debug, Default)]
struct Hint {
    tag: Option<String>,
    tokens: BTreeSet<String>,
}

impl Hint {
    fn from_locator(locator: &Locator) -> Self {
        let value = locator.value();
        match locator.strategy() {
            Strategy::Id | Strategy::Name | Strategy::Class => Self {
                tag: None,
                tokens: tokenize(value),
            },
            Strategy::Tag => Self {
                tag: Some(value.trim().to_ascii_lowercase()),
                tokens: BTreeSet::new(),
            },
            Strategy::LinkText | Strategy::PartialLinkText => Self {
                tag: Some("a".to_string()),
                tokens: tokenize(value),
            },
            Strategy::Css => {
                let tag: String = value
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                    .collect();
                Self {
                    tag: (!tag.is_empty()).then(|| tag.to_ascii_lowercase()),
                    tokens: tokenize(&value[tag.len()..]),
                }
            }
            Strategy::XPath => Self::from_xpath(value),
        }
    }

    fn from_xpath(value: &str) -> Self {
        if let Some(query) = XPathQuery::parse(value) {
            let tag = query.target_tag();
            let mut tokens = BTreeSet::new();
            if let Some(step) = query.steps().last() {
                for predicate in &step.predicates {
                    match predicate {
                        Predicate::AttributeEquals { value, .. }
                        | Predicate::AttributeContains { value, .. }
                        | Predicate::Text { value, .. } => tokens.extend(tokenize(value)),
                        Predicate::HasAttribute(_) | Predicate::Position(_) => {}
                    }
                }
            }
            return Self {
                tag: (tag != "*").then(|| tag.to_string()),
                tokens,
            };
        }

        // Unparseable: take the last named step and every quoted literal
        let (tag_re, literal_re) = xpath_scrapers();
        let tag = tag_re
            .captures_iter(value)
            .last()
            .map(|c| c[1].to_ascii_lowercase());
        let tokens = literal_re
            .captures_iter(value)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .flat_map(|m| tokenize(m.as_str()))
            .collect();
        Self { tag, tokens }
    }
}

fn xpath_scrapers() -> &'static (Regex, Regex) {
    static SCRAPERS: OnceLock<(Regex, Regex)> = OnceLock::new();
    SCRAPERS.get_or_init(|| {
        let build = |p: &str| {
            Regex::new(p).unwrap_or_else(|e| panic!("invalid xpath scraper {p}: {e}"))
        };
        (build(r"/([A-Za-z][\w-]*)"), build(r#"'([^']*)'|"([^"]*)""#))
    })
}

/// Lowercase alphanumeric fragments of at least two characters
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn element_tokens(el: ElementRef<'_>) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for (_, value) in el.value().attrs() {
        tokens.extend(tokenize(value));
    }
    tokens.extend(tokenize(&direct_text(el)));
    tokens
}

fn direct_text(el: ElementRef<'_>) -> String {
    let raw: String = el
        .children()
        .filter_map(|c| c.value().as_text().map(|t| String::from(&**t)))
        .collect();
    normalize_space(&raw)
}

fn best_match<'a>(document: &'a Html, hint: &Hint) -> Option<ElementRef<'a>> {
    let mut best: Option<((bool, usize), ElementRef<'a>)> = None;

    for el in document.tree.root().descendants().filter_map(ElementRef::wrap) {
        let tag = el.value().name();
        if SKIPPED_TAGS.contains(&tag) {
            continue;
        }
        let same_tag = hint.tag.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(tag));
        let shared = element_tokens(el).intersection(&hint.tokens).count();
        if !same_tag && shared == 0 {
            continue;
        }
        let score = (same_tag, shared);
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, el));
        }
    }

    best.map(|(_, el)| el)
}

/// Build a replacement for `el` following id, name, class, text, other
/// attributes, then structural path
fn emit(document: &Html, el: ElementRef<'_>, excerpt: &str) -> Locator {
    let tag = el.value().name();
    let unique = |expr: &str| {
        XPathQuery::parse(expr).is_some_and(|q| {
            let found = q.select(document);
            found.len() == 1 && found[0].id() == el.id()
        })
    };
    let attribute = |name: &str, value: &str| format!("//{tag}[@{name}={}]", quote_literal(value));

    if let Some(id) = el.value().id().filter(|v| !v.is_empty()) {
        let expr = attribute("id", id);
        if XPathQuery::parse(&expr).is_some() {
            return Locator::xpath(expr);
        }
    }

    if let Some(name) = el.value().attr("name").filter(|v| !v.is_empty()) {
        let expr = attribute("name", name);
        if unique(&expr) {
            return Locator::xpath(expr);
        }
    }

    for class in el.value().classes() {
        if class.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let expr = format!("//{tag}[contains(@class,{})]", quote_literal(class));
        if unique(&expr) {
            return Locator::xpath(expr);
        }
    }

    let text = direct_text(el);
    if !text.is_empty() && text.chars().count() <= MAX_TEXT_LEN {
        let expr = format!("//{tag}[normalize-space()={}]", quote_literal(&text));
        if unique(&expr) {
            return Locator::xpath(expr);
        }
    }

    for name in SECONDARY_ATTRIBUTES {
        if let Some(value) = el.value().attr(name).filter(|v| !v.is_empty()) {
            let expr = attribute(name, value);
            if unique(&expr) {
                return Locator::xpath(expr);
            }
        }
    }

    Locator::xpath(structural_path(el, excerpt))
}

/// Structural path, re-rooted when the excerpt is a `<root>` wrapper
fn structural_path(el: ElementRef<'_>, excerpt: &str) -> String {
    const WRAPPER: &str = "/html/body/root/";
    let path = StructuralPathGenerator::generate(el);
    if excerpt.trim_start().starts_with("<root>") {
        if let Some(rest) = path.strip_prefix(WRAPPER) {
            return format!("//{rest}");
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXCERPT: &str = r#"<root>
<form class="login-form">
    <input name="username" placeholder="User name">
    <input name="password" type="password">
    <button class="btn btn-primary" type="submit">Sign in</button>
    <button class="btn" type="button">Cancel</button>
</form>
<a href="/help" id="help-link">Need help?</a>
</root>"#;

    fn repair(locator: Locator) -> Option<Locator> {
        StructuralFallbackOracle::new().repair_one(&locator, EXCERPT).unwrap()
    }

    mod matching_tests {
        use super::*;

        #[test]
        fn test_renamed_id_matches_by_tokens() {
            assert_eq!(
                repair(Locator::id("username-field")),
                Some(Locator::xpath("//input[@name='username']"))
            );
        }

        #[test]
        fn test_xpath_same_tag_first() {
            assert_eq!(
                repair(Locator::xpath("//button[@id='submit-primary']")),
                Some(Locator::xpath("//button[contains(@class,'btn-primary')]"))
            );
        }

        #[test]
        fn test_text_predicate_tokens() {
            assert_eq!(
                repair(Locator::xpath("//button[text()='Cancel order']")),
                Some(Locator::xpath("//button[normalize-space()='Cancel']"))
            );
        }

        #[test]
        fn test_identified_element_uses_id() {
            assert_eq!(
                repair(Locator::link_text("Help")),
                Some(Locator::xpath("//a[@id='help-link']"))
            );
        }

        #[test]
        fn test_unparseable_xpath_still_hinted() {
            assert_eq!(
                repair(Locator::xpath("//form/input[last()][@name='password']")),
                Some(Locator::xpath("//input[@name='password']"))
            );
        }

        #[test]
        fn test_no_resemblance() {
            assert_eq!(repair(Locator::id("zzz")), None);
        }

        #[test]
        fn test_deterministic() {
            let a = repair(Locator::css("input.user"));
            let b = repair(Locator::css("input.user"));
            assert_eq!(a, b);
            assert!(a.is_some());
        }

        #[test]
        fn test_repair_many_keeps_positions() {
            let out = StructuralFallbackOracle::new()
                .repair_many(&[Locator::id("zzz"), Locator::id("password-input")], EXCERPT)
                .unwrap();
            assert_eq!(out.len(), 2);
            assert_eq!(out[0], None);
            assert_eq!(out[1], Some(Locator::xpath("//input[@name='password']")));
        }
    }

    mod emission_tests {
        use super::*;

        #[test]
        fn test_structural_path_rerooted_under_wrapper() {
            let excerpt = "<root>\n<div><span>a</span><span>b</span></div>\n</root>";
            let out = StructuralFallbackOracle::new()
                .repair_one(&Locator::tag("div"), excerpt)
                .unwrap();
            assert_eq!(out, Some(Locator::xpath("//div")));
        }

        #[test]
        fn test_tokenize() {
            let tokens = tokenize("btn-primary x Sign_in");
            assert!(tokens.contains("btn"));
            assert!(tokens.contains("primary"));
            assert!(tokens.contains("sign"));
            assert!(!tokens.contains("x"));
        }
    }
}
