use std::path::PathBuf;

use shared_types::Place;
use tracing::{debug, error, info, warn};

use crate::data_parser::{listing_url, parse_review_bodies, sanitize_review};
use crate::dataset::write_reviews;
use crate::error::ExtractionError;
use crate::services::browser::{BrowserLauncher, BrowserSession};

const CAROUSEL_SELECTOR: &str = "div.flicking-camera";
const NAVIGATION_TIMEOUT_MS: u64 = 30_000;
const SETTLE_MS: u64 = 2_000;

/// How far to follow the "load more" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// At most this many clicks.
    Bounded(usize),
    /// Click until the control disappears. The cap only stops a page that
    /// never runs out.
    UntilExhausted { safety_cap: usize },
}

impl Pagination {
    fn allows(&self, clicks: usize) -> bool {
        match *self {
            Pagination::Bounded(limit) => clicks < limit,
            Pagination::UntilExhausted { safety_cap } => clicks < safety_cap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Keep only Hangul, digits, whitespace and `!?().,`.
    Whitelist,
    TrimOnly,
}

impl Cleanup {
    fn apply(&self, raw: &str) -> String {
        match self {
            Cleanup::Whitelist => sanitize_review(raw),
            Cleanup::TrimOnly => raw.trim().to_string(),
        }
    }
}

/// Selectors plus pagination and cleanup rules for one listing layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorProfile {
    pub name: &'static str,
    pub item_selector: &'static str,
    pub body_selector: &'static str,
    pub more_selector: &'static str,
    pub pagination: Pagination,
    pub cleanup: Cleanup,
}

impl ExtractorProfile {
    pub const RECENT: ExtractorProfile = ExtractorProfile {
        name: "recent",
        item_selector: "li.pui__X35jYm.place_apply_pui.EjjAW",
        body_selector: "a.pui__xtsQN-",
        more_selector: r#"xpath=//a[@class="fvwqf"]/span[text()="더보기"]"#,
        pagination: Pagination::Bounded(3),
        cleanup: Cleanup::Whitelist,
    };

    /// Superseded by [`ExtractorProfile::RECENT`]. Expands the whole listing
    /// and only trims review bodies. The older page layout's selectors were
    /// never recorded, so this reuses the current ones; it is a pagination
    /// and cleanup strategy, not a second layout.
    pub const LEGACY: ExtractorProfile = ExtractorProfile {
        name: "legacy",
        item_selector: "li.pui__X35jYm.place_apply_pui.EjjAW",
        body_selector: "a.pui__xtsQN-",
        more_selector: r#"xpath=//a[@class="fvwqf"]/span[text()="더보기"]"#,
        pagination: Pagination::UntilExhausted { safety_cap: 200 },
        cleanup: Cleanup::TrimOnly,
    };
}

impl Default for ExtractorProfile {
    fn default() -> Self {
        Self::RECENT
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub place_id: i32,
    pub reviews: Vec<String>,
    /// Present whenever the dataset file was written, including after a failure.
    pub dataset: Option<PathBuf>,
    pub failure: Option<String>,
}

impl ExtractionReport {
    /// Extraction ran to completion and the dataset is on disk.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.dataset.is_some()
    }
}

pub struct ReviewExtractor {
    profile: ExtractorProfile,
    files_dir: PathBuf,
    navigation_timeout_ms: u64,
    settle_ms: u64,
}

impl ReviewExtractor {
    pub fn new(profile: ExtractorProfile, files_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile,
            files_dir: files_dir.into(),
            navigation_timeout_ms: NAVIGATION_TIMEOUT_MS,
            settle_ms: SETTLE_MS,
        }
    }

    pub fn profile(&self) -> &ExtractorProfile {
        &self.profile
    }

    /// Collects the place's reviews and writes its dataset. Never fails: any
    /// error is logged and recorded on the report, and whatever was
    /// collected up to that point is still written.
    pub async fn extract(&self, launcher: &dyn BrowserLauncher, place: &Place) -> ExtractionReport {
        info!(
            place_id = place.place_id,
            place_num = %place.place_num,
            profile = self.profile.name,
            "crawling reviews"
        );

        let mut reviews = Vec::new();
        let failure = match launcher.launch().await {
            Ok(session) => {
                let result = self.collect(session.as_ref(), place, &mut reviews).await;
                if let Err(e) = session.close().await {
                    warn!(place_id = place.place_id, error = %e, "failed to close browser session");
                }
                result.err()
            }
            Err(e) => Some(ExtractionError::from(e)),
        };
        if let Some(e) = &failure {
            warn!(
                place_id = place.place_id,
                error = %e,
                collected = reviews.len(),
                "review extraction failed, keeping partial results"
            );
        }

        match write_reviews(&self.files_dir, place.place_id, &reviews).await {
            Ok(path) => {
                debug!(place_id = place.place_id, path = %path.display(), count = reviews.len(), "dataset written");
                ExtractionReport {
                    place_id: place.place_id,
                    reviews,
                    dataset: Some(path),
                    failure: failure.map(|e| e.to_string()),
                }
            }
            Err(e) => {
                error!(place_id = place.place_id, error = %e, "failed to write dataset");
                ExtractionReport {
                    place_id: place.place_id,
                    reviews,
                    dataset: None,
                    failure: Some(e.to_string()),
                }
            }
        }
    }

    async fn collect(
        &self,
        session: &dyn BrowserSession,
        place: &Place,
        reviews: &mut Vec<String>,
    ) -> Result<(), ExtractionError> {
        let url = listing_url(&place.place_num);
        session.goto(&url, self.navigation_timeout_ms).await?;
        session.hide(CAROUSEL_SELECTOR).await?;
        session.press_key("PageDown").await?;

        let clicks = self.paginate(session).await?;
        debug!(place_id = place.place_id, clicks, "pagination finished");

        let html = session.content().await?;
        let bodies = parse_review_bodies(
            &html,
            self.profile.item_selector,
            self.profile.body_selector,
        )?;
        for body in bodies {
            let cleaned = self.profile.cleanup.apply(&body);
            if !cleaned.is_empty() {
                reviews.push(cleaned);
            }
        }
        Ok(())
    }

    async fn paginate(&self, session: &dyn BrowserSession) -> Result<usize, ExtractionError> {
        let selector = self.profile.more_selector;
        let mut clicks = 0;
        while self.profile.pagination.allows(clicks) {
            if !session.is_present(selector).await? {
                break;
            }
            session.scroll_into_view(selector).await?;
            session.settle(self.settle_ms).await;
            session.click(selector).await?;
            clicks += 1;
        }
        Ok(clicks)
    }
}
