// config.rs
use std::str::FromStr;
use std::time::Duration;

use validator::Validate;

use crate::db::query_timeout::QueryTimeout;

/// Tunables of the matching engine. Defaults are the reference values.
#[derive(Debug, Clone, Validate)]
pub struct MatchingConfig {
    #[validate(range(min = 0, max = 100, message = "Minimum score must be between 0 and 100"))]
    pub min_score: i32,

    #[validate(range(min = 1, message = "At least one match per run must be kept"))]
    pub max_matches_per_run: usize,

    #[validate(range(min = 1, message = "Candidate cap must be positive"))]
    pub candidate_cap: usize,

    #[validate(range(min = 1, max = 1000, message = "Batch chunk size must be between 1 and 1000"))]
    pub batch_chunk_size: usize,

    #[validate(range(min = 1, max = 64, message = "Batch concurrency must be between 1 and 64"))]
    pub batch_concurrency: usize,

    #[validate(range(min = 0, max = 50, message = "Year tolerance must be between 0 and 50"))]
    pub year_tolerance: i32,

    pub run_timeout: Duration,

    #[validate(range(min = 1, message = "Retention must be at least one day"))]
    pub dismissed_retention_days: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: 20,
            max_matches_per_run: 100,
            candidate_cap: 500,
            batch_chunk_size: 50,
            batch_concurrency: 4,
            year_tolerance: 3,
            run_timeout: QueryTimeout::DEFAULT_TIMEOUT,
            dismissed_retention_days: 30,
        }
    }
}

/// How often the `schedule` command fires each job.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub full_scan_interval: Duration,
    pub incremental_interval: Duration,
    pub cleanup_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            full_scan_interval: Duration::from_secs(21600),
            incremental_interval: Duration::from_secs(900),
            cleanup_interval: Duration::from_secs(86400),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub max_connections: u32,
    pub log_level: String,
    pub matching: MatchingConfig,
    pub schedule: ScheduleConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}

// Zero-length periods would panic tokio intervals and time out every run.
fn secs_from_env(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(key, default.as_secs()).max(1))
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let redis_url = std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        let defaults = MatchingConfig::default();
        let matching = MatchingConfig {
            min_score: env_or("FINDIT_MIN_SCORE", defaults.min_score),
            max_matches_per_run: env_or("FINDIT_MAX_MATCHES_PER_RUN", defaults.max_matches_per_run),
            candidate_cap: env_or("FINDIT_CANDIDATE_CAP", defaults.candidate_cap),
            batch_chunk_size: env_or("FINDIT_BATCH_CHUNK_SIZE", defaults.batch_chunk_size),
            batch_concurrency: env_or("FINDIT_BATCH_CONCURRENCY", defaults.batch_concurrency),
            year_tolerance: env_or("FINDIT_YEAR_TOLERANCE", defaults.year_tolerance),
            run_timeout: secs_from_env("FINDIT_RUN_TIMEOUT_SECS", defaults.run_timeout),
            dismissed_retention_days: env_or(
                "FINDIT_DISMISSED_RETENTION_DAYS",
                defaults.dismissed_retention_days,
            ),
        };

        let schedule_defaults = ScheduleConfig::default();
        let schedule = ScheduleConfig {
            full_scan_interval: secs_from_env(
                "FINDIT_FULL_SCAN_INTERVAL_SECS",
                schedule_defaults.full_scan_interval,
            ),
            incremental_interval: secs_from_env(
                "FINDIT_INCREMENTAL_INTERVAL_SECS",
                schedule_defaults.incremental_interval,
            ),
            cleanup_interval: secs_from_env(
                "FINDIT_CLEANUP_INTERVAL_SECS",
                schedule_defaults.cleanup_interval,
            ),
        };

        Config {
            database_url,
            redis_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            log_level: std::env::var("FINDIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            matching,
            schedule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_defaults_validate() {
        let config = MatchingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_score, 20);
        assert_eq!(config.max_matches_per_run, 100);
        assert_eq!(config.candidate_cap, 500);
        assert_eq!(config.batch_chunk_size, 50);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let config = MatchingConfig { min_score: 140, ..MatchingConfig::default() };
        assert!(config.validate().is_err());

        let config = MatchingConfig { batch_chunk_size: 0, ..MatchingConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unparsable_env_value_falls_back_to_default() {
        std::env::set_var("FINDIT_TEST_GARBAGE_NUMBER", "fifty");
        assert_eq!(env_or("FINDIT_TEST_GARBAGE_NUMBER", 50usize), 50);
        std::env::set_var("FINDIT_TEST_GARBAGE_NUMBER", " 75 ");
        assert_eq!(env_or("FINDIT_TEST_GARBAGE_NUMBER", 50usize), 75);
        std::env::remove_var("FINDIT_TEST_GARBAGE_NUMBER");
    }
}
