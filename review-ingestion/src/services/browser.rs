// Browser automation service
// Thin seam over the Playwright driver so the crawler logic only sees
// "navigate, query, click, read markup".

use std::sync::Arc;

use async_trait::async_trait;
use playwright::api::{Browser, BrowserContext, Page};
use playwright::Playwright;

use crate::error::BrowserError;

/// One live page owned by exactly one task for the duration of a place.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str, timeout_ms: u64) -> Result<(), BrowserError>;
    async fn current_url(&self) -> Result<String, BrowserError>;
    async fn press_key(&self, key: &str) -> Result<(), BrowserError>;
    /// Hides the first element matching `selector`; a missing element is not an error.
    async fn hide(&self, selector: &str) -> Result<(), BrowserError>;
    async fn is_present(&self, selector: &str) -> Result<bool, BrowserError>;
    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError>;
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;
    async fn settle(&self, millis: u64);
    async fn content(&self) -> Result<String, BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Starts a fresh driver for a unit of isolated work (one batch chunk).
#[async_trait]
pub trait LauncherFactory: Send + Sync {
    async fn start(&self) -> Result<Arc<dyn BrowserLauncher>, BrowserError>;
}

/// Stands in for a driver that never started. Every launch fails with
/// [`BrowserError::Driver`], so callers see a per-call failure instead of
/// losing the whole process.
#[derive(Debug, Clone)]
pub struct UnavailableLauncher {
    reason: String,
}

impl UnavailableLauncher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Err(BrowserError::Driver(self.reason.clone()))
    }
}

fn driver_err(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

fn interaction_err(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Interaction(e.to_string())
}

/// Chromium through the Playwright driver. Each instance owns its own driver
/// process, so sessions launched from different instances share nothing.
pub struct PlaywrightLauncher {
    playwright: Playwright,
    headless: bool,
}

impl PlaywrightLauncher {
    pub async fn initialize(headless: bool) -> Result<Self, BrowserError> {
        let playwright = Playwright::initialize().await.map_err(driver_err)?;
        playwright.prepare().map_err(driver_err)?;
        Ok(Self {
            playwright,
            headless,
        })
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let args = vec![
            "--window-size=1920,1080".to_string(),
            "--disable-gpu".to_string(),
        ];
        let browser = self
            .playwright
            .chromium()
            .launcher()
            .headless(self.headless)
            .args(&args)
            .launch()
            .await
            .map_err(driver_err)?;
        let context = browser.context_builder().build().await.map_err(driver_err)?;
        let page = context.new_page().await.map_err(driver_err)?;

        Ok(Box::new(PlaywrightSession {
            browser,
            _context: context,
            page,
        }))
    }
}

pub struct PlaywrightFactory {
    pub headless: bool,
}

#[async_trait]
impl LauncherFactory for PlaywrightFactory {
    async fn start(&self) -> Result<Arc<dyn BrowserLauncher>, BrowserError> {
        let launcher = PlaywrightLauncher::initialize(self.headless).await?;
        Ok(Arc::new(launcher))
    }
}

struct PlaywrightSession {
    browser: Browser,
    _context: BrowserContext,
    page: Page,
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn goto(&self, url: &str, timeout_ms: u64) -> Result<(), BrowserError> {
        self.page
            .goto_builder(url)
            .timeout(timeout_ms as f64)
            .goto()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.page.url().map_err(interaction_err)
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        self.page
            .keyboard
            .press(key, None)
            .await
            .map_err(interaction_err)
    }

    async fn hide(&self, selector: &str) -> Result<(), BrowserError> {
        let script = format!(
            "() => {{ const el = document.querySelector({}); if (el) {{ el.style.display = 'none'; }} return el !== null; }}",
            serde_json::to_string(selector).map_err(interaction_err)?
        );
        self.page
            .eval::<bool>(&script)
            .await
            .map(|_| ())
            .map_err(interaction_err)
    }

    async fn is_present(&self, selector: &str) -> Result<bool, BrowserError> {
        self.page
            .query_selector(selector)
            .await
            .map(|found| found.is_some())
            .map_err(interaction_err)
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        let handle = self
            .page
            .query_selector(selector)
            .await
            .map_err(interaction_err)?
            .ok_or_else(|| BrowserError::Interaction(format!("{} is gone", selector)))?;
        handle
            .scroll_into_view_if_needed(None)
            .await
            .map_err(interaction_err)
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let handle = self
            .page
            .query_selector(selector)
            .await
            .map_err(interaction_err)?
            .ok_or_else(|| BrowserError::Interaction(format!("{} is gone", selector)))?;
        handle.click_builder().click().await.map_err(interaction_err)
    }

    async fn settle(&self, millis: u64) {
        tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(interaction_err)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.browser.close().await.map_err(driver_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_launcher_fails_every_launch() {
        let launcher = UnavailableLauncher::new("driver missing");
        for _ in 0..2 {
            match launcher.launch().await {
                Err(BrowserError::Driver(reason)) => assert_eq!(reason, "driver missing"),
                Err(other) => panic!("unexpected error {other}"),
                Ok(_) => panic!("launch should fail"),
            }
        }
    }
}
