use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::data_parser::extract_place_num;
use crate::error::ResolutionError;
use crate::services::browser::{BrowserLauncher, BrowserSession};

const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Follows a shared place link (short links included) to its landing page
/// and reads the place number out of the final URL.
pub struct PlaceUrlResolver {
    launcher: Arc<dyn BrowserLauncher>,
    redirect_wait: Duration,
    poll_interval: Duration,
}

impl PlaceUrlResolver {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            redirect_wait: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_redirect_wait(mut self, wait: Duration, poll_interval: Duration) -> Self {
        self.redirect_wait = wait;
        self.poll_interval = poll_interval;
        self
    }

    pub async fn resolve(&self, place_url: &str) -> Result<String, ResolutionError> {
        let parsed = Url::parse(place_url.trim())
            .map_err(|_| ResolutionError::InvalidUrl(place_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ResolutionError::InvalidUrl(place_url.to_string()));
        }

        let session = self.launcher.launch().await?;
        let result = self.follow(session.as_ref(), parsed.as_str()).await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close browser session");
        }

        match &result {
            Ok(place_num) => info!(place_url, place_num = %place_num, "place url resolved"),
            Err(e) => warn!(place_url, error = %e, "place url not resolved"),
        }
        result
    }

    async fn follow(&self, session: &dyn BrowserSession, url: &str) -> Result<String, ResolutionError> {
        session.goto(url, NAVIGATION_TIMEOUT_MS).await?;

        let deadline = Instant::now() + self.redirect_wait;
        loop {
            let landing_url = session.current_url().await?;
            if let Some(place_num) = extract_place_num(&landing_url) {
                return Ok(place_num);
            }
            if Instant::now() >= deadline {
                return Err(ResolutionError::NoPlaceId { landing_url });
            }
            debug!(landing_url = %landing_url, "waiting for redirect");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
