use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use lotto_tracker::api::ResultFetcher;
use lotto_tracker::server::{self, AppState};
use lotto_tracker::use_cases::{ParticipationService, ResultService, StatsService};
use lotto_tracker::{config, connection};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = config::load()?;

    let conn = Arc::new(Mutex::new(connection::open(&config.database_path)?));

    let fetcher = Arc::new(ResultFetcher::new(
        Duration::from_secs(config.fetch_timeout_secs),
        config.cache_file.clone(),
    )?);
    let results = Arc::new(ResultService::new(Arc::clone(&conn), fetcher));

    let state = Arc::new(AppState {
        participations: ParticipationService::new(Arc::clone(&conn)),
        stats: StatsService::new(Arc::clone(&conn), Arc::clone(&results)),
        results,
        cron_secret: config.cron_secret.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, server::router(state)).await?;

    Ok(())
}
