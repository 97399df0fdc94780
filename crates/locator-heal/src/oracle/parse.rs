//! Decoding free-form oracle answers into candidate strings.

use regex::Regex;
use std::sync::OnceLock;

const FENCE: &str = "```";

/// Remove a leading and trailing code fence, including a language tag on
/// the opening fence.
#[must_use]
pub fn strip_fences(answer: &str) -> &str {
    let mut text = answer.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        text = match rest.split_once('\n') {
            Some((tag, body)) if is_fence_tag(tag) => body,
            _ => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

fn is_fence_tag(tag: &str) -> bool {
    tag.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}

fn label_pattern() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+\s*[.):]|[-*•])\s+")
            .unwrap_or_else(|e| panic!("invalid label pattern: {e}"))
    })
}

/// Drop an enumeration label such as `1.`, `2)` or `-`
#[must_use]
pub fn strip_label(line: &str) -> &str {
    let line = line.trim();
    match label_pattern().find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line,
    }
}

/// Non-blank, label-free lines of an answer, fences removed
#[must_use]
pub fn candidate_lines(answer: &str) -> Vec<&str> {
    strip_fences(answer)
        .lines()
        .map(strip_label)
        .filter(|line| !line.is_empty() && !line.starts_with(FENCE))
        .collect()
}

/// The answer to a single-locator request: its first non-blank line
#[must_use]
pub fn first_candidate(answer: &str) -> Option<&str> {
    candidate_lines(answer).into_iter().next()
}

/// Align answer lines with `expected` requested locators.
///
/// Surplus lines are dropped; missing ones are `None`.
#[must_use]
pub fn aligned_candidates(answer: &str, expected: usize) -> Vec<Option<&str>> {
    let mut lines = candidate_lines(answer).into_iter();
    (0..expected).map(|_| lines.next()).collect()
}

fn xpath_pattern() -> &'static Regex {
    static XPATH: OnceLock<Regex> = OnceLock::new();
    XPATH.get_or_init(|| {
        Regex::new(r"(//\S+\[(?:@[^\]]+|contains\([^\]]+\))\])")
            .unwrap_or_else(|e| panic!("invalid xpath scan pattern: {e}"))
    })
}

/// Every `//tag[@...]` or `//tag[contains(...)]` expression in the answer,
/// in order of appearance.
#[must_use]
pub fn scan_xpaths(answer: &str) -> Vec<&str> {
    xpath_pattern()
        .find_iter(strip_fences(answer))
        .map(|m| m.as_str())
        .collect()
}
