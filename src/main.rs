use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::LevelFilter;
use uuid::Uuid;
use validator::Validate;

use findit::{
    config::Config,
    db::db::DBClient,
    service::background_jobs::{start_cleanup_job, start_full_scan_job, start_incremental_scan_job},
    AppState,
};

#[derive(Parser)]
#[command(name = "findit-worker")]
#[command(about = "FindIt request-to-listing matching jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Full scan of every active request
    FullScan,

    /// Scan only listings created since each request's last run
    IncrementalScan,

    /// Purge old dismissed matches and matches on invalidated listings
    Cleanup {
        /// Override the dismissed-match retention, in days
        #[arg(long)]
        retention_days: Option<i64>,
    },

    /// Full scan of a single request
    Process { criteria_id: Uuid },

    /// Incremental scan of a single request
    ProcessIncremental { criteria_id: Uuid },

    /// Drop a request's matches and scan it again
    Refresh { criteria_id: Uuid },

    /// Keep running and fire every job on its configured interval
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::init();

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::INFO))
        .init();

    config
        .matching
        .validate()
        .context("invalid FindIt matching configuration")?;

    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;
    tracing::info!("✅ Connection to the database is successful!");

    let db_client = match config.redis_url.as_deref() {
        Some(redis_url) => DBClient::with_redis(pool, redis_url).await,
        None => {
            tracing::info!("ℹ️  Redis not configured - match events will only be logged (set REDIS_URL to enable)");
            DBClient::new(pool)
        }
    };

    let app_state = Arc::new(AppState::new(db_client, config.clone()));
    let matching = app_state.matching_service.clone();

    match cli.command {
        Commands::Migrate => {
            app_state.db_client.run_migrations().await?;
            tracing::info!("Migrations applied");
        }
        Commands::FullScan => {
            let report = matching.process_all_active().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::IncrementalScan => {
            let report = matching.process_all_incremental().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Cleanup { retention_days } => {
            let retention_days = retention_days.unwrap_or(config.matching.dismissed_retention_days);
            let report = app_state.maintenance_service.run_cleanup(retention_days).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Process { criteria_id } => {
            let created = matching.process_by_id(criteria_id).await?;
            println!("{} new matches for request {}", created, criteria_id);
        }
        Commands::ProcessIncremental { criteria_id } => {
            let created = matching.process_incremental_by_id(criteria_id).await?;
            println!("{} new matches for request {}", created, criteria_id);
        }
        Commands::Refresh { criteria_id } => {
            let created = matching.refresh_by_id(criteria_id).await?;
            println!("{} matches after refreshing request {}", created, criteria_id);
        }
        Commands::Schedule => {
            tracing::info!(
                "🚀 FindIt scheduler running (full every {:?}, incremental every {:?}, cleanup every {:?})",
                config.schedule.full_scan_interval,
                config.schedule.incremental_interval,
                config.schedule.cleanup_interval
            );

            let full = tokio::spawn(start_full_scan_job(app_state.clone()));
            let incremental = tokio::spawn(start_incremental_scan_job(app_state.clone()));
            let cleanup = tokio::spawn(start_cleanup_job(app_state.clone()));

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown requested, stopping FindIt jobs");

            full.abort();
            incremental.abort();
            cleanup.abort();
        }
    }

    Ok(())
}
