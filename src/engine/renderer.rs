// * Page Renderer - Headless Browser Session
// * One ChromiumOxide browser per extraction request; released on every exit path

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::future::BoxFuture;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::network::identity::IdentityProfile;
use crate::ops::telemetry;
use crate::refinery::schema::RenderedPage;

// * Reads the HTTP status of the main document (0 when the browser does not expose it)
const NAVIGATION_STATUS_JS: &str = r#"
(() => {
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : 0;
})()
"#;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Page navigation failed: {0}")]
    Navigation(String),

    #[error("Page timeout after {0}ms")]
    Timeout(u64),

    #[error("Target answered HTTP {0}")]
    HttpStatus(u16),

    #[error("Content extraction failed: {0}")]
    ContentExtraction(String),

    #[error("Pagination interaction failed: {0}")]
    Interaction(String),

    #[error("Browser session already closed")]
    SessionClosed,
}

impl RenderError {
    /// The target answered that the page does not exist
    pub fn is_missing_page(&self) -> bool {
        matches!(self, RenderError::HttpStatus(404 | 410))
    }
}

/// How to reach the next results page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceTarget {
    /// A discovered next-page link
    Link(String),
    /// A next-page control without a usable href
    Click(String),
    /// A URL built from the page-number pattern
    Url(String),
}

impl AdvanceTarget {
    pub fn url(&self) -> Option<&str> {
        match self {
            AdvanceTarget::Link(url) | AdvanceTarget::Url(url) => Some(url),
            AdvanceTarget::Click(_) => None,
        }
    }
}

/// Rendering capability consumed by the pipeline
pub trait PageRenderer: Send {
    /// Loads a URL and returns the settled DOM
    fn render<'a>(&'a mut self, url: &'a str) -> BoxFuture<'a, Result<RenderedPage, RenderError>>;

    /// Moves to the next page; Ok(None) when no advancement happened
    fn advance<'a>(
        &'a mut self,
        target: &'a AdvanceTarget,
    ) -> BoxFuture<'a, Result<Option<RenderedPage>, RenderError>>;

    /// Releases the session; must be safe to call more than once
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Chromium-backed renderer holding one live browser session
pub struct ChromiumRenderer {
    browser: Option<Browser>,
    handler: Option<tokio::task::JoinHandle<()>>,
    page: Option<Page>,
    config: RenderConfig,
}

impl ChromiumRenderer {
    /// Launches a headless browser for one extraction request
    pub async fn launch(config: RenderConfig) -> Result<Self, RenderError> {
        let identity = IdentityProfile::generate_chrome_120();
        let (width, height) = identity.window_size;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .request_timeout(config.page_timeout);
        for arg in identity.browser_args() {
            builder = builder.arg(arg);
        }
        let browser_config = builder.build().map_err(RenderError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        // * Spawn handler in background
        let handle = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {
                // * Drive CDP events
            }
        });

        telemetry::increment_active_sessions();
        info!("Browser session launched");

        Ok(Self {
            browser: Some(browser),
            handler: Some(handle),
            page: None,
            config,
        })
    }

    async fn ensure_page(&mut self) -> Result<&Page, RenderError> {
        if self.page.is_none() {
            let browser = self.browser.as_ref().ok_or(RenderError::SessionClosed)?;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            self.page = Some(page);
        }
        self.page.as_ref().ok_or(RenderError::SessionClosed)
    }

    async fn navigate(&mut self, url: &str) -> Result<RenderedPage, RenderError> {
        let timeout = self.config.page_timeout;
        let settle = self.config.settle_delay;
        let page = self.ensure_page().await?;

        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(RenderError::Navigation(e.to_string())),
            Err(_) => return Err(RenderError::Timeout(timeout.as_millis() as u64)),
        }

        let status = page
            .evaluate(NAVIGATION_STATUS_JS)
            .await
            .ok()
            .and_then(|v| v.into_value::<u16>().ok())
            .unwrap_or(0);
        if status != 0 && !(200..300).contains(&status) {
            return Err(RenderError::HttpStatus(status));
        }

        // * Let JavaScript-driven content settle
        tokio::time::sleep(settle).await;

        snapshot(page, url).await
    }

    async fn click_next(&mut self, selector: &str) -> Result<Option<RenderedPage>, RenderError> {
        let settle = self.config.settle_delay;
        let page = self.ensure_page().await?;

        let element = match page.find_element(selector).await {
            Ok(element) => element,
            Err(e) => {
                debug!(selector = selector, error = %e, "Next-page control not found");
                return Ok(None);
            }
        };

        element
            .click()
            .await
            .map_err(|e| RenderError::Interaction(e.to_string()))?;

        tokio::time::sleep(settle).await;

        let fallback_url = page.url().await.ok().flatten().unwrap_or_default();
        snapshot(page, &fallback_url).await.map(Some)
    }

    /// Closes the browser gracefully
    pub async fn shutdown(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Browser close reported an error");
            }
            let _ = browser.wait().await;
            telemetry::decrement_active_sessions();
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        info!("Browser session released");
    }
}

async fn snapshot(page: &Page, requested_url: &str) -> Result<RenderedPage, RenderError> {
    // * Final URL after redirects
    let final_url = page
        .url()
        .await
        .map_err(|e| RenderError::ContentExtraction(e.to_string()))?
        .unwrap_or_else(|| requested_url.to_string());

    let html = page
        .content()
        .await
        .map_err(|e| RenderError::ContentExtraction(e.to_string()))?;

    Ok(RenderedPage::new(final_url, html))
}

impl PageRenderer for ChromiumRenderer {
    fn render<'a>(&'a mut self, url: &'a str) -> BoxFuture<'a, Result<RenderedPage, RenderError>> {
        Box::pin(self.navigate(url))
    }

    fn advance<'a>(
        &'a mut self,
        target: &'a AdvanceTarget,
    ) -> BoxFuture<'a, Result<Option<RenderedPage>, RenderError>> {
        Box::pin(async move {
            match target {
                AdvanceTarget::Link(url) | AdvanceTarget::Url(url) => self.navigate(url).await.map(Some),
                AdvanceTarget::Click(selector) => self.click_next(selector).await,
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.shutdown())
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        // * Can't await in drop; the Browser's own Drop kills the child process
        if self.browser.take().is_some() {
            telemetry::decrement_active_sessions();
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_target_url() {
        assert_eq!(AdvanceTarget::Link("https://a.test/2".into()).url(), Some("https://a.test/2"));
        assert_eq!(AdvanceTarget::Click("a.next".into()).url(), None);
    }

    #[test]
    fn test_missing_page_statuses() {
        assert!(RenderError::HttpStatus(404).is_missing_page());
        assert!(RenderError::HttpStatus(410).is_missing_page());
        assert!(!RenderError::HttpStatus(503).is_missing_page());
        assert!(!RenderError::Timeout(30_000).is_missing_page());
    }

    #[test]
    fn test_status_script_reads_navigation_entry() {
        assert!(NAVIGATION_STATUS_JS.contains("getEntriesByType('navigation')"));
        assert!(NAVIGATION_STATUS_JS.contains("responseStatus"));
    }
}
