//! Shared state for a crawl run, built once at startup and handed to the
//! scheduler, the batch runner and the one-shot actions.

use std::sync::Arc;

use chrono::FixedOffset;
use shared_types::Place;

use crate::actions::review_analysis::{analyze_place, AnalysisClient, AnalysisOutcome};
use crate::actions::review_crawler::{ExtractorProfile, ReviewExtractor};
use crate::config::Config;
use crate::repository::{connect_pool, FeedbackStore, PgFeedbackStore, PgPlaceSource, PlaceSource};
use crate::services::browser::{BrowserLauncher, LauncherFactory, PlaywrightFactory};
use crate::services::clova::ClovaTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// Extraction failed; the partial dataset was written and analysis skipped.
    ExtractionFailed,
    Analyzed(AnalysisOutcome),
}

pub struct PipelineContext {
    pub extractor: ReviewExtractor,
    pub analysis: AnalysisClient,
    pub feedback: Arc<dyn FeedbackStore>,
    pub places: Arc<dyn PlaceSource>,
    pub browsers: Arc<dyn LauncherFactory>,
    pub timezone: FixedOffset,
}

impl PipelineContext {
    /// Production wiring: Postgres pool, CLOVA transport, Playwright drivers.
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = connect_pool(&config.database_url).await?;
        Ok(Self {
            extractor: ReviewExtractor::new(ExtractorProfile::RECENT, config.files_dir.clone()),
            analysis: AnalysisClient::new(Arc::new(ClovaTransport::new(config.clova.clone()))),
            feedback: Arc::new(PgFeedbackStore::new(pool.clone())),
            places: Arc::new(PgPlaceSource::new(pool)),
            browsers: Arc::new(PlaywrightFactory {
                headless: config.headless,
            }),
            timezone: config.timezone,
        })
    }

    /// Crawls one place and, if extraction completed, analyzes the dataset
    /// it just wrote.
    pub async fn crawl_and_analyze(&self, launcher: &dyn BrowserLauncher, place: &Place) -> PlaceOutcome {
        let report = self.extractor.extract(launcher, place).await;
        let dataset = match (&report.dataset, report.is_complete()) {
            (Some(path), true) => path.clone(),
            _ => return PlaceOutcome::ExtractionFailed,
        };

        let outcome = analyze_place(
            &self.analysis,
            self.feedback.as_ref(),
            self.timezone,
            place.place_id,
            &dataset,
        )
        .await;
        PlaceOutcome::Analyzed(outcome)
    }
}
