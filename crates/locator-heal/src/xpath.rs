//! Structural paths and a small XPath evaluator.
//!
//! [`StructuralPathGenerator`] computes the canonical ancestor-chain path of
//! an element: one segment per level, `tag[@id='v']` terminating the walk
//! at the first identified ancestor, `tag[k]` for the k-th of several
//! same-tag siblings and bare `tag` otherwise.
//!
//! [`XPathQuery`] understands the shapes those paths use plus the handful
//! of predicates repair candidates typically carry (`@attr='v'`,
//! `contains(@attr,'v')`, `text()='v'`, ...). Anything outside that subset
//! fails to parse and callers fall back to other strategies.

use crate::locator::{Locator, Strategy};
use crate::result::{HealError, HealResult};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

// =============================================================================
// STRUCTURAL PATHS
// =============================================================================

/// Canonical structural path generator
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralPathGenerator;

impl StructuralPathGenerator {
    /// Compute the structural path of one element
    #[must_use]
    pub fn generate(element: ElementRef<'_>) -> String {
        let mut segments = Vec::new();
        let mut current = Some(element);

        while let Some(el) = current {
            let tag = el.value().name();
            if let Some(id) = el.value().id().filter(|id| !id.is_empty()) {
                segments.push(format!("{tag}[@id={}]", quote_literal(id)));
                break;
            }
            segments.push(match sibling_position(el) {
                Some(k) => format!("{tag}[{k}]"),
                None => tag.to_string(),
            });
            current = el.parent().and_then(ElementRef::wrap);
        }

        segments.iter().rev().map(|s| format!("/{s}")).collect()
    }

    /// Compute paths for every element of a document, in document order
    #[must_use]
    pub fn generate_all(document: &Html) -> Vec<(ElementRef<'_>, String)> {
        document
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| (el, Self::generate(el)))
            .collect()
    }

    /// Paths only, in document order
    #[must_use]
    pub fn paths(document: &Html) -> Vec<String> {
        Self::generate_all(document)
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }
}

/// 1-based position among same-tag siblings, `None` when the tag is unique
fn sibling_position(element: ElementRef<'_>) -> Option<usize> {
    let parent = element.parent()?;
    let tag = element.value().name();
    let mut position = None;
    let mut count = 0;
    for sibling in parent.children().filter_map(ElementRef::wrap) {
        if sibling.value().name() != tag {
            continue;
        }
        count += 1;
        if sibling.id() == element.id() {
            position = Some(count);
        }
    }
    if count > 1 {
        position
    } else {
        None
    }
}

/// Quote a string as an XPath literal
#[must_use]
pub fn quote_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

// =============================================================================
// XPATH SUBSET
// =============================================================================

/// Step axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `/tag`
    Child,
    /// `//tag`
    Descendant,
}

/// How a text predicate compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    /// Exact, whitespace preserved
    Exact,
    /// Substring
    Contains,
    /// Exact after whitespace normalization
    Normalized,
}

/// Which text a predicate reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScope {
    /// Direct text children (`text()`)
    Direct,
    /// Full string value (`.`)
    StringValue,
}

/// A supported predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `[k]`
    Position(usize),
    /// `[@name]`
    HasAttribute(String),
    /// `[@name='value']`
    AttributeEquals {
        /// Attribute name
        name: String,
        /// Expected value
        value: String,
    },
    /// `[contains(@name,'value')]`
    AttributeContains {
        /// Attribute name
        name: String,
        /// Expected substring
        value: String,
    },
    /// `[text()='v']`, `[contains(.,'v')]`, `[normalize-space()='v']`, ...
    Text {
        /// Comparison
        matching: TextMatch,
        /// Text source
        scope: TextScope,
        /// Expected text
        value: String,
    },
}

/// One location step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Axis
    pub axis: Axis,
    /// Tag name (lowercase) or `*`
    pub tag: String,
    /// Predicates, applied in order
    pub predicates: Vec<Predicate>,
}

/// A parsed XPath from the supported subset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathQuery {
    steps: Vec<Step>,
}

impl XPathQuery {
    /// Parse an expression. Returns `None` outside the supported subset.
    #[must_use]
    pub fn parse(expr: &str) -> Option<Self> {
        let s = expr.trim();
        let mut steps = Vec::new();
        let mut rest = s;

        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else if steps.is_empty() {
                Axis::Child
            } else {
                return None;
            };

            let name_len = rest.find(['[', '/']).unwrap_or(rest.len());
            let tag = rest[..name_len].trim();
            if tag.is_empty() || !is_name(tag) {
                return None;
            }
            rest = &rest[name_len..];

            let mut predicates = Vec::new();
            while rest.starts_with('[') {
                let close = closing_bracket(rest)?;
                predicates.push(parse_predicate(&rest[1..close])?);
                rest = &rest[close + 1..];
            }

            steps.push(Step {
                axis,
                tag: tag.to_ascii_lowercase(),
                predicates,
            });
        }

        if steps.is_empty() {
            return None;
        }

        // A structural path that stopped at an identified ancestor is
        // anchored on that element wherever it sits in the document.
        if s.starts_with('/') && !s.starts_with("//") {
            if let Some(first) = steps.first_mut() {
                let identified = first
                    .predicates
                    .iter()
                    .any(|p| matches!(p, Predicate::AttributeEquals { name, .. } if name == "id"));
                if identified {
                    first.axis = Axis::Descendant;
                }
            }
        }

        Some(Self { steps })
    }

    /// The parsed steps
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Tag of the final step
    #[must_use]
    pub fn target_tag(&self) -> &str {
        self.steps.last().map_or("*", |s| s.tag.as_str())
    }

    /// Best-effort relaxation: `//<final tag>` with no predicates
    #[must_use]
    pub fn relaxed(&self) -> Option<Self> {
        let tag = self.target_tag();
        if tag == "*" {
            return None;
        }
        let relaxed = Self {
            steps: vec![Step {
                axis: Axis::Descendant,
                tag: tag.to_string(),
                predicates: Vec::new(),
            }],
        };
        (relaxed != *self).then_some(relaxed)
    }

    /// Evaluate against a document, returning matches in document order
    #[must_use]
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let all: Vec<ElementRef<'a>> = document
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();

        let mut context: HashSet<_> = HashSet::from([document.tree.root().id()]);
        let mut matched = Vec::new();

        for step in &self.steps {
            let mut candidates: Vec<ElementRef<'a>> = all
                .iter()
                .copied()
                .filter(|el| tag_matches(&step.tag, el.value().name()))
                .filter(|el| match step.axis {
                    Axis::Child => el.parent().is_some_and(|p| context.contains(&p.id())),
                    Axis::Descendant => el.ancestors().any(|a| context.contains(&a.id())),
                })
                .collect();

            for predicate in &step.predicates {
                candidates = apply_predicate(predicate, candidates);
            }

            context = candidates.iter().map(|el| el.id()).collect();
            matched = candidates;
            if matched.is_empty() {
                break;
            }
        }

        matched
    }
}

fn tag_matches(step_tag: &str, element_tag: &str) -> bool {
    step_tag == "*" || step_tag.eq_ignore_ascii_case(element_tag)
}

fn apply_predicate<'a>(predicate: &Predicate, candidates: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
    match predicate {
        Predicate::Position(k) => {
            let mut seen = HashMap::new();
            candidates
                .into_iter()
                .filter(|el| {
                    let rank = seen.entry(el.parent().map(|p| p.id())).or_insert(0usize);
                    *rank += 1;
                    *rank == *k
                })
                .collect()
        }
        _ => candidates
            .into_iter()
            .filter(|el| predicate_holds(predicate, *el))
            .collect(),
    }
}

fn predicate_holds(predicate: &Predicate, el: ElementRef<'_>) -> bool {
    match predicate {
        Predicate::Position(_) => true,
        Predicate::HasAttribute(name) => el.value().attr(name).is_some(),
        Predicate::AttributeEquals { name, value } => el.value().attr(name) == Some(value.as_str()),
        Predicate::AttributeContains { name, value } => el
            .value()
            .attr(name)
            .is_some_and(|v| v.contains(value.as_str())),
        Predicate::Text {
            matching,
            scope,
            value,
        } => {
            let texts: Vec<String> = match scope {
                TextScope::Direct => el
                    .children()
                    .filter_map(|c| c.value().as_text().map(|t| String::from(&**t)))
                    .collect(),
                TextScope::StringValue => vec![el.text().collect()],
            };
            texts.iter().any(|t| match matching {
                TextMatch::Exact => t == value,
                TextMatch::Contains => t.contains(value.as_str()),
                TextMatch::Normalized => normalize_space(t) == normalize_space(value),
            })
        }
    }
}

/// Collapse runs of whitespace and trim, as XPath `normalize-space()`
#[must_use]
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_name(tag: &str) -> bool {
    tag == "*"
        || tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// Index of the `]` closing the predicate that opens at `s[0]`
fn closing_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

const QUOTED: &str = r#"(?:'[^']*'|"[^"]*")"#;
const LITERAL: &str = r#"(?:'([^']*)'|"([^"]*)"|concat\(\s*((?:'[^']*'|"[^"]*")(?:\s*,\s*(?:'[^']*'|"[^"]*"))*)\s*\))"#;

struct PredicatePatterns {
    attr_eq: Regex,
    attr_contains: Regex,
    text_eq: Regex,
    text_contains: Regex,
    normalized_eq: Regex,
    has_attr: Regex,
    quoted: Regex,
}

fn patterns() -> &'static PredicatePatterns {
    static PATTERNS: OnceLock<PredicatePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |p: String| {
            Regex::new(&p).unwrap_or_else(|e| panic!("invalid predicate pattern {p}: {e}"))
        };
        PredicatePatterns {
            attr_eq: build(format!(r"^@([\w:.-]+)\s*=\s*{LITERAL}$")),
            attr_contains: build(format!(r"^contains\(\s*@([\w:.-]+)\s*,\s*{LITERAL}\s*\)$")),
            text_eq: build(format!(r"^(text\(\)|\.)\s*=\s*{LITERAL}$")),
            text_contains: build(format!(r"^contains\(\s*(text\(\)|\.)\s*,\s*{LITERAL}\s*\)$")),
            normalized_eq: build(format!(
                r"^normalize-space\(\s*(text\(\)|\.)?\s*\)\s*=\s*{LITERAL}$"
            )),
            has_attr: build(r"^@([\w:.-]+)$".to_string()),
            quoted: build(QUOTED.to_string()),
        }
    })
}

/// Value of a literal captured at group `first`: single-quoted,
/// double-quoted, or the `concat(...)` form `quote_literal` emits.
fn literal(caps: &regex::Captures<'_>, first: usize) -> String {
    if let Some(m) = caps.get(first).or_else(|| caps.get(first + 1)) {
        return m.as_str().to_string();
    }
    caps.get(first + 2).map_or_else(String::new, |args| {
        patterns()
            .quoted
            .find_iter(args.as_str())
            .map(|part| {
                let quoted = part.as_str();
                &quoted[1..quoted.len() - 1]
            })
            .collect()
    })
}

fn scope_of(token: Option<regex::Match<'_>>) -> TextScope {
    match token.map(|m| m.as_str()) {
        Some(".") => TextScope::StringValue,
        _ => TextScope::Direct,
    }
}

fn parse_predicate(body: &str) -> Option<Predicate> {
    let body = body.trim();
    if let Ok(k) = body.parse::<usize>() {
        return (k > 0).then_some(Predicate::Position(k));
    }
    let p = patterns();
    if let Some(caps) = p.attr_eq.captures(body) {
        return Some(Predicate::AttributeEquals {
            name: caps[1].to_string(),
            value: literal(&caps, 2),
        });
    }
    if let Some(caps) = p.attr_contains.captures(body) {
        return Some(Predicate::AttributeContains {
            name: caps[1].to_string(),
            value: literal(&caps, 2),
        });
    }
    if let Some(caps) = p.text_eq.captures(body) {
        return Some(Predicate::Text {
            matching: TextMatch::Exact,
            scope: scope_of(caps.get(1)),
            value: literal(&caps, 2),
        });
    }
    if let Some(caps) = p.text_contains.captures(body) {
        return Some(Predicate::Text {
            matching: TextMatch::Contains,
            scope: scope_of(caps.get(1)),
            value: literal(&caps, 2),
        });
    }
    if let Some(caps) = p.normalized_eq.captures(body) {
        // normalize-space() with no argument reads the string value
        let scope = match caps.get(1).map(|m| m.as_str()) {
            Some("text()") => TextScope::Direct,
            _ => TextScope::StringValue,
        };
        return Some(Predicate::Text {
            matching: TextMatch::Normalized,
            scope,
            value: literal(&caps, 2),
        });
    }
    if let Some(caps) = p.has_attr.captures(body) {
        return Some(Predicate::HasAttribute(caps[1].to_string()));
    }
    None
}

// =============================================================================
// LOCATOR QUERIES
// =============================================================================

/// A locator compiled for evaluation against a parsed document
#[derive(Debug, Clone)]
pub enum ElementQuery {
    /// XPath-subset query
    XPath(XPathQuery),
    /// CSS selector (id, name, class, tag and css strategies)
    Css {
        /// Compiled selector
        selector: Selector,
        /// Selector source
        source: String,
    },
    /// Anchor text match
    LinkText {
        /// Text to match
        text: String,
        /// Substring instead of exact match
        partial: bool,
    },
}

impl ElementQuery {
    /// Compile a locator
    pub fn compile(locator: &Locator) -> HealResult<Self> {
        match locator.strategy() {
            Strategy::XPath => XPathQuery::parse(locator.value())
                .map(Self::XPath)
                .ok_or_else(|| {
                    HealError::invalid_locator(format!("unsupported XPath: {}", locator.value()))
                }),
            Strategy::LinkText | Strategy::PartialLinkText => Ok(Self::LinkText {
                text: locator.value().trim().to_string(),
                partial: locator.strategy() == Strategy::PartialLinkText,
            }),
            _ => {
                let source = locator
                    .to_css()
                    .ok_or_else(|| HealError::invalid_locator(locator.key()))?;
                Self::css(&source)
            }
        }
    }

    fn css(source: &str) -> HealResult<Self> {
        let selector = Selector::parse(source)
            .map_err(|e| HealError::invalid_locator(format!("{source}: {e}")))?;
        Ok(Self::Css {
            selector,
            source: source.to_string(),
        })
    }

    /// Evaluate against a document, matches in document order
    #[must_use]
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match self {
            Self::XPath(query) => query.select(document),
            Self::Css { selector, .. } => document.select(selector).collect(),
            Self::LinkText { text, partial } => {
                let anchors = document
                    .tree
                    .root()
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "a");
                anchors
                    .filter(|el| {
                        let visible = normalize_space(&el.text().collect::<String>());
                        if *partial {
                            visible.contains(text.as_str())
                        } else {
                            visible == *text
                        }
                    })
                    .collect()
            }
        }
    }

    /// Bare-tag relaxation of an attribute-shaped query
    #[must_use]
    pub fn relaxed(&self) -> Option<Self> {
        match self {
            Self::XPath(query) => query.relaxed().map(Self::XPath),
            Self::Css { source, .. } => {
                let tag: String = source
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                    .collect();
                let first_is_alpha = tag.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
                if first_is_alpha && tag.len() < source.trim().len() {
                    Self::css(&tag).ok()
                } else {
                    None
                }
            }
            Self::LinkText { .. } => Self::css("a").ok(),
        }
    }
}
