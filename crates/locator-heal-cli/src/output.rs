//! Terminal output helpers

use console::{style, Term};
use serde::Serialize;

/// Writes command results to stdout and failure marks to stderr
#[derive(Debug)]
pub struct Printer {
    term: Term,
    err_term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl Printer {
    /// Create a printer
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            err_term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Plain line, always printed
    pub fn line(&self, text: impl AsRef<str>) -> std::io::Result<()> {
        self.term.write_line(text.as_ref())
    }

    /// Section heading, suppressed in quiet mode
    pub fn heading(&self, text: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        if self.use_color {
            self.term.write_line(&style(text).bold().to_string())
        } else {
            self.term.write_line(text)
        }
    }

    /// Success line, suppressed in quiet mode
    pub fn success(&self, text: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.term.write_line(&self.mark("✓", text, true))
    }

    /// Failure line on stderr, always printed
    pub fn failure(&self, text: &str) -> std::io::Result<()> {
        self.err_term.write_line(&self.mark("✗", text, false))
    }

    /// Pretty JSON document, always printed
    pub fn json<T: Serialize>(&self, value: &T) -> crate::CliResult<()> {
        let rendered = serde_json::to_string_pretty(value)?;
        self.term.write_line(&rendered)?;
        Ok(())
    }

    fn mark(&self, symbol: &str, text: &str, ok: bool) -> String {
        match (self.use_color, ok) {
            (false, _) => format!("{symbol} {text}"),
            (true, true) => format!("{} {text}", style(symbol).green()),
            (true, false) => format!("{} {text}", style(symbol).red()),
        }
    }
}
