//! Annotated document snapshots.
//!
//! A snapshot is the serialized document prefixed with a comment header
//! listing how many structural paths it contains and a short sample of
//! them. Snapshots are persisted as `snapshot_<YYYYMMDD_HHMMSS>.html` so a
//! failed healing attempt can be inspected afterwards, and a trimmed
//! excerpt of one is what the repair oracle gets to see.

use crate::locator::Locator;
use crate::result::{HealError, HealResult};
use crate::xpath::{ElementQuery, StructuralPathGenerator};
use chrono::{DateTime, Local};
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Default artifact directory
pub const DEFAULT_OUTPUT_DIR: &str = "html_snapshots";

/// Number of paths listed in the artifact header
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Character budget of an untargeted excerpt
pub const DEFAULT_TRIM_LIMIT: usize = 20_000;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Configuration for snapshot capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Directory for persisted artifacts, `None` keeps snapshots in memory
    pub output_dir: Option<PathBuf>,
    /// Paths listed in the header
    pub sample_size: usize,
    /// Characters kept when an excerpt cannot be targeted
    pub trim_limit: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            output_dir: Some(PathBuf::from(DEFAULT_OUTPUT_DIR)),
            sample_size: DEFAULT_SAMPLE_SIZE,
            trim_limit: DEFAULT_TRIM_LIMIT,
        }
    }
}

impl SnapshotConfig {
    /// Set the artifact directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Keep snapshots in memory only
    #[must_use]
    pub fn without_persistence(mut self) -> Self {
        self.output_dir = None;
        self
    }

    /// Set header sample size
    #[must_use]
    pub const fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set excerpt character budget
    #[must_use]
    pub const fn with_trim_limit(mut self, trim_limit: usize) -> Self {
        self.trim_limit = trim_limit;
        self
    }
}

/// A captured document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSnapshot {
    /// Serialized document as repaired by the parser
    pub markup: String,
    /// Structural path of every element, in document order
    pub indexed_paths: Vec<String>,
    /// Capture time
    pub captured_at: DateTime<Local>,
    /// Header comment followed by the markup
    pub artifact: String,
    /// Where the artifact was written
    pub artifact_path: Option<PathBuf>,
}

impl DocumentSnapshot {
    /// Number of indexed paths
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.indexed_paths.len()
    }
}

/// Captures, persists and trims document snapshots
#[derive(Debug, Clone, Default)]
pub struct DocumentSnapshotter {
    config: SnapshotConfig,
}

impl DocumentSnapshotter {
    /// Create a snapshotter
    #[must_use]
    pub const fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Capture `markup`, index its structural paths and persist the artifact
    pub fn capture(&self, markup: &str) -> HealResult<DocumentSnapshot> {
        if markup.trim().is_empty() {
            return Err(HealError::snapshot("document markup is empty"));
        }

        let document = Html::parse_document(markup);
        let indexed_paths = StructuralPathGenerator::paths(&document);
        let serialized = document.html();
        let artifact = format!(
            "{}{serialized}",
            header(&indexed_paths, self.config.sample_size)
        );
        let captured_at = Local::now();

        let artifact_path = match &self.config.output_dir {
            Some(dir) => Some(
                persist(dir, &artifact, &captured_at)
                    .map_err(|e| HealError::snapshot(format!("{}: {e}", dir.display())))?,
            ),
            None => None,
        };

        tracing::debug!(
            paths = indexed_paths.len(),
            artifact = ?artifact_path,
            "captured document snapshot"
        );

        Ok(DocumentSnapshot {
            markup: serialized,
            indexed_paths,
            captured_at,
            artifact,
            artifact_path,
        })
    }

    /// Reduce `markup` to the parts relevant to `damaged`.
    ///
    /// Matches are concatenated inside `<root>` in locator order. Queries
    /// that match nothing are retried with their bare tag. When nothing
    /// can be targeted the first `trim_limit` characters are returned.
    #[must_use]
    pub fn trim(&self, markup: &str, damaged: &[Locator]) -> String {
        let document = Html::parse_document(markup);
        let mut fragments = Vec::new();

        for locator in damaged {
            let Ok(query) = ElementQuery::compile(locator) else {
                tracing::debug!(locator = %locator, "locator not translatable for trimming");
                continue;
            };
            let mut matches = query.select(&document);
            if matches.is_empty() {
                if let Some(relaxed) = query.relaxed() {
                    matches = relaxed.select(&document);
                }
            }
            fragments.extend(matches.into_iter().map(|el| el.html()));
        }

        if fragments.is_empty() {
            return prefix(markup, self.config.trim_limit).to_string();
        }

        let mut excerpt = String::from("<root>\n");
        for fragment in fragments {
            excerpt.push_str(&fragment);
            excerpt.push('\n');
        }
        excerpt.push_str("</root>");
        excerpt
    }
}

fn header(paths: &[String], sample_size: usize) -> String {
    let sample: Vec<&str> = paths.iter().take(sample_size).map(String::as_str).collect();
    format!(
        "<!--\nStructural paths for every element\nTotal paths: {}\nSample paths:\n{}\n-->\n",
        paths.len(),
        sample.join("\n")
    )
}

/// First `limit` characters of `text`, cut on a char boundary
fn prefix(text: &str, limit: usize) -> &str {
    text.char_indices()
        .nth(limit)
        .map_or(text, |(end, _)| &text[..end])
}

fn cleaned_dirs() -> &'static Mutex<HashSet<PathBuf>> {
    static CLEANED: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    CLEANED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Delete prior `*.html` artifacts in `dir`, once per directory per process
fn clean_once(dir: &Path) -> std::io::Result<()> {
    let key = dir.canonicalize()?;
    let mut cleaned = cleaned_dirs().lock().unwrap_or_else(|p| p.into_inner());
    if !cleaned.insert(key) {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_html = path.extension().is_some_and(|ext| ext == "html");
        if is_html && path.is_file() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete old snapshot");
            }
        }
    }
    Ok(())
}

fn persist(dir: &Path, artifact: &str, captured_at: &DateTime<Local>) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    clean_once(dir)?;

    let stamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
    let mut path = dir.join(format!("snapshot_{stamp}.html"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("snapshot_{stamp}_{n}.html"));
        n += 1;
    }

    fs::write(&path, artifact)?;
    tracing::info!(path = %path.display(), "saved document snapshot");
    Ok(path)
}
