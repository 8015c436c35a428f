use std::{env, sync::Arc};

use anyhow::{anyhow, Context};
use tracing_subscriber::EnvFilter;

use review_ingestion::actions::batch_scheduler::run_batch;
use review_ingestion::repository::PlaceSource;
use review_ingestion::services::browser::{LauncherFactory, PlaywrightLauncher};
use review_ingestion::{compute_groups, schedule, Config, PipelineContext, PlaceUrlResolver, Weekday};

enum IngestAction {
    Schedule,
    RunBatch,
    CrawlPlace,
    ResolveUrl,
}

impl IngestAction {
    fn new(action: &str) -> anyhow::Result<Self> {
        match action {
            "SCHEDULE" => Ok(Self::Schedule),
            "RUN_BATCH" => Ok(Self::RunBatch),
            "CRAWL_PLACE" => Ok(Self::CrawlPlace),
            "RESOLVE_URL" => Ok(Self::ResolveUrl),
            other => Err(anyhow!("invalid ACTION {:?}", other)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,review_ingestion=debug")),
        )
        .init();

    let config = Config::load()?;
    let action = env::var("ACTION").context("ACTION must be set")?;

    match IngestAction::new(&action)? {
        IngestAction::Schedule => {
            let ctx = Arc::new(PipelineContext::connect(&config).await?);
            let mut scheduler = schedule(ctx).await?;
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down scheduler");
            scheduler.shutdown().await?;
        }
        IngestAction::RunBatch => {
            let day: Weekday = env::var("DAY").context("DAY must be set")?.parse()?;
            let ctx = Arc::new(PipelineContext::connect(&config).await?);
            let places = ctx.places.places().await?;
            let group = compute_groups(&places).remove(&day).unwrap_or_default();
            let summary = run_batch(ctx, group).await;
            tracing::info!(day = day.as_str(), ?summary, "batch complete");
        }
        IngestAction::CrawlPlace => {
            let place_id: i32 = env::var("PLACE_ID")
                .context("PLACE_ID must be set")?
                .parse()
                .context("PLACE_ID must be an integer")?;
            let ctx = PipelineContext::connect(&config).await?;
            let place = ctx
                .places
                .place(place_id)
                .await?
                .ok_or_else(|| anyhow!("no place with id {}", place_id))?;
            let launcher = ctx.browsers.start().await?;
            let outcome = ctx.crawl_and_analyze(launcher.as_ref(), &place).await;
            tracing::info!(place_id, ?outcome, "place processed");
        }
        IngestAction::ResolveUrl => {
            let place_url = env::var("PLACE_URL").context("PLACE_URL must be set")?;
            let launcher = PlaywrightLauncher::initialize(config.headless).await?;
            let resolver = PlaceUrlResolver::new(Arc::new(launcher));
            let place_num = resolver.resolve(&place_url).await?;
            println!("{}", place_num);
        }
    }
    Ok(())
}
