// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};

use crate::AppState;

/// Periodic full scan of every active FindIt request
pub async fn start_full_scan_job(app_state: Arc<AppState>) {
    let mut interval = interval(app_state.env.schedule.full_scan_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        tracing::info!("Running FindIt full scan job at {}", Utc::now());

        match app_state.matching_service.process_all_active().await {
            Ok(report) => {
                tracing::info!(
                    "FindIt full scan completed: {} requests, {} new matches, {} failures",
                    report.processed,
                    report.new_matches,
                    report.failures.len()
                );
                if let Some(reason) = &report.aborted {
                    tracing::warn!("FindIt full scan stopped early: {}", reason);
                }
            }
            Err(e) => tracing::error!("FindIt full scan job failed: {}", e),
        }
    }
}

/// Cheap polling between full scans: only listings created since each request's last run
pub async fn start_incremental_scan_job(app_state: Arc<AppState>) {
    let mut interval = interval(app_state.env.schedule.incremental_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the full scan job covers startup
    interval.tick().await;

    loop {
        interval.tick().await;

        tracing::info!("Running FindIt incremental scan job at {}", Utc::now());

        match app_state.matching_service.process_all_incremental().await {
            Ok(report) => {
                tracing::info!(
                    "FindIt incremental scan completed: {} requests, {} new matches, {} failures",
                    report.processed,
                    report.new_matches,
                    report.failures.len()
                );
                if let Some(reason) = &report.aborted {
                    tracing::warn!("FindIt incremental scan stopped early: {}", reason);
                }
            }
            Err(e) => tracing::error!("FindIt incremental scan job failed: {}", e),
        }
    }
}

/// Purge stale dismissed matches and matches on listings that went away
pub async fn start_cleanup_job(app_state: Arc<AppState>) {
    let mut interval = interval(app_state.env.schedule.cleanup_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        tracing::info!("Running FindIt cleanup job at {}", Utc::now());

        let retention_days = app_state.env.matching.dismissed_retention_days;
        match app_state.maintenance_service.run_cleanup(retention_days).await {
            Ok(report) => tracing::info!(
                "FindIt cleanup completed: {} dismissed, {} invalidated matches removed",
                report.dismissed_purged,
                report.invalidated_purged
            ),
            Err(e) => tracing::error!("FindIt cleanup job failed: {}", e),
        }
    }
}
