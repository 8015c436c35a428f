use std::sync::Arc;

use anyhow::Context;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use review_ingestion::services::browser::PlaywrightLauncher;
use review_ingestion::{schedule, Config, PipelineContext, PlaceUrlResolver};
use web::server::{launcher_or_unavailable, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try the workspace root first when started from web/
    dotenvy::from_filename("../.env")
        .or_else(|_| dotenvy::dotenv())
        .ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,web=debug,review_ingestion=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("failed to load configuration")?;

    let mut scheduler = match PipelineContext::connect(&config).await {
        Ok(ctx) => match schedule(Arc::new(ctx)).await {
            Ok(scheduler) => Some(scheduler),
            Err(e) => {
                tracing::error!(error = %e, "scheduler failed to start, weekly crawl not scheduled");
                None
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "database unavailable, weekly crawl not scheduled");
            None
        }
    };

    let launcher = launcher_or_unavailable(PlaywrightLauncher::initialize(config.headless).await);
    let state = AppState {
        resolver: Arc::new(PlaceUrlResolver::new(launcher)),
        scheduler_active: scheduler.is_some(),
    };

    let app = router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    if let Some(scheduler) = scheduler.as_mut() {
        tracing::info!("stopping scheduler");
        scheduler.shutdown().await?;
    }
    Ok(())
}
