use anyhow::Context;
use ibsync::datasource::Mt5TradeFeed;
use ibsync::orchestration::SyncRunner;
use ibsync::{config::Config, db::init_db, Repository, TradeFeed};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = Config::from_env().context("configuration error")?;

    // Initialize database and dependencies
    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));
    let feed: Arc<dyn TradeFeed> = Arc::new(
        Mt5TradeFeed::new(
            config.trade_api_url.clone(),
            Duration::from_secs(config.fetch_timeout_secs),
        )
        .context("failed to build trade feed client")?,
    );

    // One scheduled batch run per invocation; cron owns the schedule.
    let runner = SyncRunner::new(repo, feed, config);
    let report = runner.run().await.context("commission sync failed")?;

    if report.brokers_failed > 0 {
        anyhow::bail!(
            "{} broker(s) failed during sync, see logs",
            report.brokers_failed
        );
    }

    Ok(())
}
