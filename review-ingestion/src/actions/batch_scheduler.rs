use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use shared_types::Place;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

use crate::actions::review_analysis::AnalysisOutcome;
use crate::error::WeekdayParseError;
use crate::pipeline::{PipelineContext, PlaceOutcome};
use crate::services::browser::{BrowserLauncher, UnavailableLauncher};

const CHUNK_SIZE: usize = 4;
const MAX_CONCURRENT_CHUNKS: usize = 4;
const PLACES_PER_CHUNK_IN_FLIGHT: usize = 8;

/// Weekday bucket a place is crawled in, indexed from Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    pub fn for_place(place_id: i32) -> Self {
        Self::ALL[place_id.rem_euclid(7) as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Sun => "sun",
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
        }
    }

    /// Six-field cron expression firing at 03:00:00 on this weekday.
    pub fn cron_expression(&self) -> String {
        let day = match self {
            Weekday::Sun => "Sun",
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
        };
        format!("0 0 3 * * {}", day)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = WeekdayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == wanted)
            .ok_or_else(|| WeekdayParseError(s.to_string()))
    }
}

/// Buckets places by `place_id mod 7`. Every weekday is present, possibly
/// with an empty list, and input order is kept within a bucket.
pub fn compute_groups(places: &[Place]) -> BTreeMap<Weekday, Vec<Place>> {
    let mut groups: BTreeMap<Weekday, Vec<Place>> =
        Weekday::ALL.into_iter().map(|day| (day, Vec::new())).collect();
    for place in places {
        groups
            .entry(Weekday::for_place(place.place_id))
            .or_default()
            .push(place.clone());
    }
    groups
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub places: usize,
    pub stored: usize,
    pub extraction_failed: usize,
    /// Extraction succeeded but nothing was stored (empty dataset, missing
    /// model result, missing feedback row, store error).
    pub analysis_incomplete: usize,
    pub failed_chunks: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: PlaceOutcome) {
        self.places += 1;
        match outcome {
            PlaceOutcome::Analyzed(AnalysisOutcome::Stored) => self.stored += 1,
            PlaceOutcome::Analyzed(_) => self.analysis_incomplete += 1,
            PlaceOutcome::ExtractionFailed => self.extraction_failed += 1,
        }
    }

    fn merge(&mut self, other: BatchSummary) {
        self.places += other.places;
        self.stored += other.stored;
        self.extraction_failed += other.extraction_failed;
        self.analysis_incomplete += other.analysis_incomplete;
        self.failed_chunks += other.failed_chunks;
    }
}

/// Runs one bucket: chunks of four places, at most four chunks at once,
/// each chunk on its own browser driver. Failures stay inside their place
/// or chunk; the call returns once every chunk has finished.
pub async fn run_batch(ctx: Arc<PipelineContext>, group: Vec<Place>) -> BatchSummary {
    let mut join_set = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CHUNKS));

    for chunk in group.chunks(CHUNK_SIZE) {
        let chunk = chunk.to_vec();
        let ctx = Arc::clone(&ctx);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await.ok();
            run_chunk(ctx, chunk).await
        });
    }

    let mut summary = BatchSummary::default();
    while let Some(result) = join_set.join_next().await {
        match result {
            Ok(chunk_summary) => summary.merge(chunk_summary),
            Err(e) => {
                error!(error = %e, "batch chunk aborted");
                summary.failed_chunks += 1;
            }
        }
    }
    summary
}

async fn run_chunk(ctx: Arc<PipelineContext>, chunk: Vec<Place>) -> BatchSummary {
    let launcher: Arc<dyn BrowserLauncher> = match ctx.browsers.start().await {
        Ok(launcher) => launcher,
        Err(e) => {
            error!(error = %e, places = chunk.len(), "browser driver failed to start for chunk");
            Arc::new(UnavailableLauncher::new(e.to_string()))
        }
    };

    let outcomes: Vec<PlaceOutcome> = stream::iter(chunk)
        .map(|place| {
            let ctx = Arc::clone(&ctx);
            let launcher = Arc::clone(&launcher);
            async move { ctx.crawl_and_analyze(launcher.as_ref(), &place).await }
        })
        .buffer_unordered(PLACES_PER_CHUNK_IN_FLIGHT)
        .collect()
        .await;

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        summary.record(outcome);
    }
    summary
}

/// Prevents a bucket from starting while its previous run is still going.
#[derive(Debug, Default)]
pub struct RunGuard {
    active: AtomicBool,
}

pub struct ActiveRun<'a> {
    guard: &'a RunGuard,
}

impl RunGuard {
    pub fn try_begin(&self) -> Option<ActiveRun<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveRun { guard: self })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.guard.active.store(false, Ordering::Release);
    }
}

/// One scheduled trigger: re-reads the registered places so newly added
/// ones are picked up, then runs `day`'s bucket. Returns `None` when the
/// trigger was skipped.
pub async fn run_scheduled_bucket(
    ctx: Arc<PipelineContext>,
    day: Weekday,
    guard: &RunGuard,
) -> Option<BatchSummary> {
    let Some(_run) = guard.try_begin() else {
        warn!(day = day.as_str(), "previous run still active, skipping trigger");
        return None;
    };

    let places = match ctx.places.places().await {
        Ok(places) => places,
        Err(e) => {
            error!(day = day.as_str(), error = %e, "failed to load places");
            return None;
        }
    };
    let group = compute_groups(&places).remove(&day).unwrap_or_default();
    info!(day = day.as_str(), places = group.len(), "batch starting");

    let summary = run_batch(ctx, group).await;
    info!(
        day = day.as_str(),
        places = summary.places,
        stored = summary.stored,
        extraction_failed = summary.extraction_failed,
        analysis_incomplete = summary.analysis_incomplete,
        failed_chunks = summary.failed_chunks,
        "batch finished"
    );
    Some(summary)
}

/// Registers one weekly job per weekday bucket at 03:00 in the pipeline's
/// timezone and starts the scheduler.
pub async fn schedule(ctx: Arc<PipelineContext>) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    for day in Weekday::ALL {
        let job_ctx = Arc::clone(&ctx);
        let guard = Arc::new(RunGuard::default());
        let job = Job::new_async_tz(
            day.cron_expression().as_str(),
            ctx.timezone,
            move |_uuid, _lock| {
                let ctx = Arc::clone(&job_ctx);
                let guard = Arc::clone(&guard);
                Box::pin(async move {
                    run_scheduled_bucket(ctx, day, &guard).await;
                })
            },
        )?;
        scheduler.add(job).await?;
    }

    scheduler.start().await?;
    info!("weekly crawl jobs scheduled at 03:00 for every weekday bucket");
    Ok(scheduler)
}
