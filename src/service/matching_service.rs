// service/matching_service.rs
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use crate::{
    config::MatchingConfig,
    db::{
        criteriadb::CriteriaExt, matchdb::MatchExt, query_timeout::QueryTimeout, MatchingStore,
    },
    models::{
        criteriamodel::MatchCriteria,
        listingmodel::CandidateItem,
        matchmodel::{BatchReport, MatchRecord, NewMatchesNotice, ScanMode, ScoredCandidate},
    },
    service::{
        candidate_retriever::CandidateRetriever, error::ServiceError,
        notification_service::MatchNotifier, scoring::Scorer,
    },
};

/// Drops everything under `min_score`, sorts best first and keeps at most
/// `max_results`. Ties keep their incoming order.
pub fn filter_above_threshold(
    mut scored: Vec<ScoredCandidate>,
    min_score: i32,
    max_results: usize,
) -> Vec<ScoredCandidate> {
    scored.retain(|candidate| candidate.score >= min_score);
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(max_results);
    scored
}

/// Runs FindIt matching: retrieve, score, filter, store, bookkeeping.
pub struct MatchingService<S> {
    store: Arc<S>,
    retriever: CandidateRetriever<S>,
    scorer: Scorer,
    notifier: Arc<dyn MatchNotifier>,
    config: MatchingConfig,
}

impl<S> MatchingService<S>
where
    S: MatchingStore,
{
    pub fn new(
        store: Arc<S>,
        scorer: Scorer,
        notifier: Arc<dyn MatchNotifier>,
        config: MatchingConfig,
    ) -> Self {
        let retriever = CandidateRetriever::new(store.clone(), &config);
        Self {
            store,
            retriever,
            scorer,
            notifier,
            config,
        }
    }

    /// Full scan of one request. Returns how many matches were newly stored.
    pub async fn process_one(&self, criteria: &MatchCriteria) -> Result<usize, ServiceError> {
        self.run(criteria, ScanMode::Full).await
    }

    /// Like `process_one`, restricted to listings created after the last run.
    pub async fn process_incremental(&self, criteria: &MatchCriteria) -> Result<usize, ServiceError> {
        self.run(criteria, ScanMode::Incremental).await
    }

    /// Drops every stored match of the request, then scans from scratch.
    pub async fn refresh(&self, criteria: &MatchCriteria) -> Result<usize, ServiceError> {
        let deleted = self.store.clear_matches(criteria.id).await?;
        tracing::info!("FindIt: refresh cleared {} matches for request {}", deleted, criteria.id);
        self.process_one(criteria).await
    }

    pub async fn process_by_id(&self, criteria_id: Uuid) -> Result<usize, ServiceError> {
        let criteria = self.load_criteria(criteria_id).await?;
        self.process_one(&criteria).await
    }

    pub async fn process_incremental_by_id(&self, criteria_id: Uuid) -> Result<usize, ServiceError> {
        let criteria = self.load_criteria(criteria_id).await?;
        self.process_incremental(&criteria).await
    }

    pub async fn refresh_by_id(&self, criteria_id: Uuid) -> Result<usize, ServiceError> {
        let criteria = self.load_criteria(criteria_id).await?;
        self.refresh(&criteria).await
    }

    /// Full scan of every active request, chunk by chunk. A failing request is
    /// reported and skipped; it never aborts the batch. If paging itself fails
    /// the report covers the chunks that ran and carries `aborted`.
    pub async fn process_all_active(&self) -> Result<BatchReport, ServiceError> {
        self.process_batch(ScanMode::Full).await
    }

    pub async fn process_all_incremental(&self) -> Result<BatchReport, ServiceError> {
        self.process_batch(ScanMode::Incremental).await
    }

    pub async fn update_counters(&self, criteria_id: Uuid) -> Result<i32, ServiceError> {
        Ok(self.store.update_match_counter(criteria_id).await?)
    }

    pub async fn dismiss_match(
        &self,
        criteria_id: Uuid,
        match_id: Uuid,
    ) -> Result<MatchRecord, ServiceError> {
        self.store
            .set_match_dismissed(criteria_id, match_id, true)
            .await?
            .ok_or(ServiceError::MatchNotFound(match_id))
    }

    pub async fn restore_match(
        &self,
        criteria_id: Uuid,
        match_id: Uuid,
    ) -> Result<MatchRecord, ServiceError> {
        self.store
            .set_match_dismissed(criteria_id, match_id, false)
            .await?
            .ok_or(ServiceError::MatchNotFound(match_id))
    }

    /// Stored matches, best first. Dismissed ones only on request.
    pub async fn list_matches(
        &self,
        criteria_id: Uuid,
        include_dismissed: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchRecord>, ServiceError> {
        Ok(self
            .store
            .get_matches_for_criteria(criteria_id, include_dismissed, limit, offset)
            .await?)
    }

    pub fn score_candidates(
        &self,
        criteria: &MatchCriteria,
        candidates: &[CandidateItem],
    ) -> Vec<ScoredCandidate> {
        candidates
            .iter()
            .map(|candidate| ScoredCandidate {
                listing_id: candidate.id,
                score: self.scorer.score(criteria, candidate),
            })
            .collect()
    }

    async fn load_criteria(&self, criteria_id: Uuid) -> Result<MatchCriteria, ServiceError> {
        self.store
            .get_criteria_by_id(criteria_id)
            .await?
            .ok_or(ServiceError::CriteriaNotFound(criteria_id))
    }

    async fn run(&self, criteria: &MatchCriteria, mode: ScanMode) -> Result<usize, ServiceError> {
        let inserted = self.match_and_store(criteria, mode).await?;
        if !inserted.is_empty() {
            self.notify(criteria, &inserted).await;
        }
        Ok(inserted.len())
    }

    /// Retrieve, score, filter and store. Returns only the records created by this run.
    async fn match_and_store(
        &self,
        criteria: &MatchCriteria,
        mode: ScanMode,
    ) -> Result<Vec<MatchRecord>, ServiceError> {
        if !criteria.is_active() {
            tracing::debug!(
                "FindIt: skipping request {} ({}), not active",
                criteria.id,
                criteria.status.to_str()
            );
            return Ok(vec![]);
        }

        // Watermark is the run start so listings created mid-run are seen next time.
        let started_at = Utc::now();

        let exclude_ids = self.store.get_matched_listing_ids(criteria.id).await?;
        let since = match mode {
            ScanMode::Full => None,
            ScanMode::Incremental => Some(criteria.incremental_since()),
        };

        let candidates = self
            .retriever
            .find_candidates(criteria, &exclude_ids, since)
            .await?;

        let scored = self.score_candidates(criteria, &candidates);
        let kept = filter_above_threshold(
            scored,
            self.config.min_score,
            self.config.max_matches_per_run,
        );

        let inserted = self.store.insert_matches(criteria.id, &kept).await?;
        self.store.update_last_matched_at(criteria.id, started_at).await?;

        tracing::info!(
            "FindIt: {} scan of request {} -> {} candidates, {} kept, {} new",
            mode.to_str(),
            criteria.id,
            candidates.len(),
            kept.len(),
            inserted.len()
        );

        Ok(inserted)
    }

    async fn notify(&self, criteria: &MatchCriteria, inserted: &[MatchRecord]) {
        let best_match = inserted
            .iter()
            .max_by_key(|record| record.score)
            .map(|record| ScoredCandidate {
                listing_id: record.listing_id,
                score: record.score,
            });

        let notice = NewMatchesNotice {
            criteria_id: criteria.id,
            user_id: criteria.user_id,
            new_matches: inserted.len(),
            best_match,
            produced_at: Utc::now(),
        };

        // Expiry is logged like any other delivery failure.
        let deadline = self.config.run_timeout;
        match tokio::time::timeout(deadline, self.notifier.notify_new_matches(&notice)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("FindIt: failed to notify about request {}: {}", criteria.id, e);
                return;
            }
            Err(_) => {
                tracing::warn!(
                    "FindIt: notifier for request {} did not answer within {:?}",
                    criteria.id,
                    deadline
                );
                return;
            }
        }

        let listing_ids: Vec<Uuid> = inserted.iter().map(|record| record.listing_id).collect();
        if let Err(e) = self
            .store
            .mark_matches_notified(criteria.id, &listing_ids, notice.produced_at)
            .await
        {
            tracing::warn!("FindIt: failed to stamp notified_at for request {}: {}", criteria.id, e);
        }
    }

    async fn run_bounded(
        &self,
        criteria: MatchCriteria,
        mode: ScanMode,
        run_timeout: std::time::Duration,
    ) -> (Uuid, Result<usize, ServiceError>) {
        let stored = QueryTimeout::execute_with_timeout(
            criteria.id,
            self.match_and_store(&criteria, mode),
            run_timeout,
        )
        .await;

        // Storage only; `notify` enforces its own deadline.
        let outcome = match stored {
            Ok(inserted) => {
                if !inserted.is_empty() {
                    self.notify(&criteria, &inserted).await;
                }
                Ok(inserted.len())
            }
            Err(e) => Err(e),
        };
        (criteria.id, outcome)
    }

    async fn process_batch(&self, mode: ScanMode) -> Result<BatchReport, ServiceError> {
        let chunk_size = self.config.batch_chunk_size.max(1);
        let concurrency = self.config.batch_concurrency.max(1);
        let run_timeout = self.config.run_timeout;

        let mut report = BatchReport::start(mode);
        let mut after: Option<Uuid> = None;

        loop {
            let page = match self
                .store
                .get_active_criteria_page(after, chunk_size as i64, Utc::now())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    // Chunks already processed are committed; report them.
                    tracing::error!(
                        "FindIt: {} batch stopped, could not load requests after {:?}: {}",
                        mode.to_str(),
                        after,
                        e
                    );
                    report.abort(ServiceError::from(e).to_string());
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len();
            after = page.last().map(|criteria| criteria.id);

            let runs: Vec<_> = page
                .into_iter()
                .map(|criteria| self.run_bounded(criteria, mode, run_timeout))
                .collect();
            let outcomes: Vec<(Uuid, Result<usize, ServiceError>)> = stream::iter(runs)
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (criteria_id, outcome) in outcomes {
                match &outcome {
                    Err(e) if e.is_transient() => tracing::warn!(
                        "FindIt: {} scan failed for request {}, next run retries: {}",
                        mode.to_str(),
                        criteria_id,
                        e
                    ),
                    Err(e) => tracing::error!(
                        "FindIt: {} scan failed for request {}: {}",
                        mode.to_str(),
                        criteria_id,
                        e
                    ),
                    Ok(_) => {}
                }
                report.record(criteria_id, outcome.map_err(|e| e.to_string()));
            }

            if page_len < chunk_size {
                break;
            }
        }

        let report = report.finish();
        tracing::info!(
            "FindIt: {} batch done, {} requests processed, {} new matches, {} failures",
            mode.to_str(),
            report.processed,
            report.new_matches,
            report.failures.len()
        );

        Ok(report)
    }
}
