//! CDP document driver over chromiumoxide.
//!
//! Locators are compiled to JavaScript collectors (`Locator::to_query`) and
//! evaluated in the page; matches come back as JSON element handles. The
//! driver owns a tokio runtime so it can sit behind the synchronous
//! [`DocumentDriver`] trait.

use crate::driver::{DocumentDriver, ElementHandle};
use crate::locator::Locator;
use crate::result::{HealError, HealResult};
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use std::sync::Mutex;
use tokio::runtime::Runtime;

/// Launch options for [`ChromiumDriver`]
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// Run without a window
    pub headless: bool,
    /// Chromium sandbox (disable in containers)
    pub sandbox: bool,
    /// Path to the chromium binary, `None` auto-detects
    pub chromium_path: Option<String>,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
        }
    }
}

impl ChromiumOptions {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable the sandbox
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }
}

/// Chromium-backed document driver
#[derive(Debug)]
pub struct ChromiumDriver {
    runtime: Runtime,
    browser: Mutex<CdpBrowser>,
    page: CdpPage,
    handler: tokio::task::JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch chromium and open `url`
    pub fn launch(options: &ChromiumOptions, url: &str) -> HealResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let mut builder = CdpConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(HealError::driver)?;

        let (browser, page, handler) = runtime.block_on(async {
            let (browser, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| HealError::driver(format!("browser launch failed: {e}")))?;
            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });
            let page = browser
                .new_page(url)
                .await
                .map_err(|e| HealError::driver(format!("failed to open {url}: {e}")))?;
            Ok::<_, HealError>((browser, page, handle))
        })?;
        tracing::info!(url, headless = options.headless, "chromium driver ready");

        Ok(Self {
            runtime,
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    /// Navigate the page
    pub fn goto(&self, url: &str) -> HealResult<()> {
        self.runtime.block_on(async {
            self.page
                .goto(url)
                .await
                .map_err(|e| HealError::driver(format!("navigation to {url} failed: {e}")))?;
            Ok(())
        })
    }

    fn evaluate(&self, expression: String) -> HealResult<serde_json::Value> {
        self.runtime.block_on(async {
            let result = self
                .page
                .evaluate(expression)
                .await
                .map_err(|e| HealError::driver(format!("script evaluation failed: {e}")))?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        })
    }
}

/// Wrap a locator query so each match is reported as an element handle
fn collector(locator: &Locator) -> String {
    format!(
        "(() => Array.from({query}).map(el => {{ \
            const style = window.getComputedStyle(el); \
            const rect = el.getBoundingClientRect(); \
            return {{ \
                tag_name: el.tagName.toLowerCase(), \
                text: (el.textContent || '').replace(/\\s+/g, ' ').trim(), \
                attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])), \
                displayed: style.display !== 'none' && style.visibility !== 'hidden' \
                    && (rect.width > 0 || rect.height > 0), \
                path: '' \
            }}; \
        }}))()",
        query = locator.to_query()
    )
}

impl DocumentDriver for ChromiumDriver {
    fn find_elements(&self, locator: &Locator) -> HealResult<Vec<ElementHandle>> {
        let value = self.evaluate(collector(locator))?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    fn page_source(&self) -> HealResult<String> {
        self.runtime.block_on(async {
            self.page
                .content()
                .await
                .map_err(|e| HealError::driver(format!("page content unavailable: {e}")))
        })
    }

    fn execute_script(&self, script: &str) -> HealResult<serde_json::Value> {
        self.evaluate(script.to_string())
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        let browser = self.browser.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = self.runtime.block_on(browser.close()) {
            tracing::debug!(error = %e, "browser close failed");
        }
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_wraps_query() {
        let script = collector(&Locator::id("login"));
        assert!(script.contains("document.querySelectorAll"));
        assert!(script.contains("tag_name"));
        assert!(script.starts_with("(() => Array.from("));
    }

    #[test]
    fn test_options_builders() {
        let options = ChromiumOptions::default()
            .with_headless(false)
            .with_no_sandbox()
            .with_chromium_path("/usr/bin/chromium");
        assert!(!options.headless);
        assert!(!options.sandbox);
        assert_eq!(options.chromium_path.as_deref(), Some("/usr/bin/chromium"));
    }
}
