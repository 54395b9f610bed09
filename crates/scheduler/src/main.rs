use herald_common::config::AppConfig;
use herald_common::{db, redis_pool};
use herald_engine::runner::{BatchRunner, RunnerSettings};
use herald_mailer::ResendMailer;
use herald_scheduler::daemon::ScheduleDaemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_scheduler=info,herald_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("Herald scheduler starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Connect to Redis (run lock)
    let redis = redis_pool::create_redis_pool(&config.redis_url).await?;

    let mailer = ResendMailer::from_config(&config)?;
    let settings = RunnerSettings::from_config(&config);
    let runner = BatchRunner::new(pool.clone(), mailer, settings.clone());

    let mut daemon = ScheduleDaemon::new(pool, redis, runner, settings.schedule_interval);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = daemon.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Schedule daemon exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Herald scheduler stopped.");
    Ok(())
}
