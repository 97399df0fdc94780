//! Repair request rendering.

use crate::locator::Locator;
use serde::Serialize;
use std::fmt::Write as _;

/// One repair request: the damaged locators and the document excerpt
/// they were supposed to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealingRequest {
    /// Locators that no longer resolve
    pub damaged: Vec<Locator>,
    /// Trimmed document excerpt
    pub excerpt: String,
}

impl HealingRequest {
    /// Create a request
    #[must_use]
    pub fn new(damaged: Vec<Locator>, excerpt: impl Into<String>) -> Self {
        Self {
            damaged,
            excerpt: excerpt.into(),
        }
    }

    /// Request for a single locator
    #[must_use]
    pub fn single(damaged: &Locator, excerpt: impl Into<String>) -> Self {
        Self::new(vec![damaged.clone()], excerpt)
    }

    /// Render the prompt sent to the oracle
    #[must_use]
    pub fn into_prompt(self) -> String {
        let mut listing = String::new();
        for (i, locator) in self.damaged.iter().enumerate() {
            let _ = writeln!(listing, "{}. {}", i + 1, locator.key());
        }

        format!(
            "ROLE: You repair broken element locators for UI test automation.\n\n\
             INPUT:\n\
             1) Damaged locators:\n{listing}\n\
             2) Document excerpt:\n'''\n{excerpt}\n'''\n\n\
             TASK:\n\
             - For each damaged locator, find the element it was meant to target in the excerpt.\n\
             - If that element is still present, write a corrected locator that matches it.\n\
             - If it cannot be matched with confidence, write the most stable locator for the element the original was aiming at.\n\n\
             LOCATOR RULES:\n\
             - Attribute priority: @id, then @name, then a stable part of @class, then visible text, then other attributes.\n\
             - Prefer exact attribute matches. Use contains() only when no exact match is possible.\n\
             - If the damaged locator used contains(), keep the substring match.\n\
             - Match visible text with its literal whitespace.\n\
             - Prefer short, stable locators. Avoid absolute paths such as /html/body/...\n\
             - Each locator must match exactly one element.\n\n\
             OUTPUT FORMAT (STRICT):\n\
             - Exactly one locator per line, in the order of the damaged list ({count} line{plural}).\n\
             - Write XPath expressions, or strategy=value such as id=submit.\n\
             - No numbering, no explanations, no comments, no markdown.\n",
            excerpt = self.excerpt,
            count = self.damaged.len(),
            plural = if self.damaged.len() == 1 { "" } else { "s" },
        )
    }
}
