use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct MatchRecord {
    pub id: Uuid,
    pub criteria_id: Uuid,
    pub listing_id: Uuid,
    pub score: i32,
    pub dismissed: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate that went through the scorer, before persistence.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub listing_id: Uuid,
    pub score: i32,
}

/// What the notifier gets told after a run produced new matches.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewMatchesNotice {
    pub criteria_id: Uuid,
    pub user_id: Uuid,
    pub new_matches: usize,
    pub best_match: Option<ScoredCandidate>,
    pub produced_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Full,
    Incremental,
}

impl ScanMode {
    pub fn to_str(&self) -> &str {
        match self {
            ScanMode::Full => "full",
            ScanMode::Incremental => "incremental",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CriteriaFailure {
    pub criteria_id: Uuid,
    pub error: String,
}

/// Outcome of a batch run over many requests.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchReport {
    pub mode: ScanMode,
    pub processed: usize,
    pub new_matches: usize,
    pub failures: Vec<CriteriaFailure>,
    /// Set when the batch stopped early; counts above cover the chunks that ran.
    pub aborted: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn start(mode: ScanMode) -> Self {
        let now = Utc::now();
        Self {
            mode,
            processed: 0,
            new_matches: 0,
            failures: Vec::new(),
            aborted: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn record(&mut self, criteria_id: Uuid, outcome: Result<usize, String>) {
        match outcome {
            Ok(count) => {
                self.processed += 1;
                self.new_matches += count;
            }
            Err(error) => self.failures.push(CriteriaFailure { criteria_id, error }),
        }
    }

    pub fn abort(&mut self, error: String) {
        self.aborted = Some(error);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.aborted.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceReport {
    pub dismissed_purged: u64,
    pub invalidated_purged: u64,
}
