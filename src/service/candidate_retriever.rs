// service/candidate_retriever.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::MatchingConfig,
    db::listingdb::{CandidateQuery, ListingExt, Preference, YearWindow},
    models::{criteriamodel::MatchCriteria, listingmodel::CandidateItem},
    service::error::ServiceError,
};

/// Builds bounded listing queries for a request.
///
/// Hard filters (live, not the requester's, not already matched, optionally
/// newer than a watermark) exclude. Brand and city only reorder: listings are
/// pulled bucket by bucket, preferred buckets first, each bucket newest first,
/// until the cap is reached.
#[derive(Debug, Clone)]
pub struct CandidateRetriever<S> {
    store: Arc<S>,
    candidate_cap: usize,
    year_tolerance: i32,
}

impl<S> CandidateRetriever<S>
where
    S: ListingExt + Send + Sync,
{
    pub fn new(store: Arc<S>, config: &MatchingConfig) -> Self {
        Self {
            store,
            candidate_cap: config.candidate_cap,
            year_tolerance: config.year_tolerance,
        }
    }

    pub async fn find_candidates(
        &self,
        criteria: &MatchCriteria,
        exclude_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CandidateItem>, ServiceError> {
        let year_window = self.year_window(criteria);
        let mut candidates: Vec<CandidateItem> = Vec::new();

        for (brand, city) in preference_buckets(criteria) {
            let remaining = self.candidate_cap.saturating_sub(candidates.len());
            if remaining == 0 {
                break;
            }

            let query = CandidateQuery {
                exclude_owner: criteria.user_id,
                exclude_ids: exclude_ids.to_vec(),
                created_after: since,
                year_window,
                brand,
                city,
                limit: remaining as i64,
            };

            let bucket = self.store.find_candidate_listings(&query).await?;
            candidates.extend(bucket);
        }

        tracing::debug!(
            "FindIt: retrieved {} candidates for request {} (excluded {}, since {:?})",
            candidates.len(),
            criteria.id,
            exclude_ids.len(),
            since
        );

        Ok(candidates)
    }

    /// Requested year range widened by the tolerance on each given side.
    fn year_window(&self, criteria: &MatchCriteria) -> Option<YearWindow> {
        if !criteria.has_year_range() {
            return None;
        }
        Some(YearWindow {
            min: criteria.min_year.map(|year| year.saturating_sub(self.year_tolerance)),
            max: criteria.max_year.map(|year| year.saturating_add(self.year_tolerance)),
        })
    }
}

/// Brand/city buckets in preference order. Buckets are disjoint.
pub fn preference_buckets(criteria: &MatchCriteria) -> Vec<(Preference, Preference)> {
    let split = |value: Option<Uuid>| match value {
        Some(id) => vec![Preference::Matching(id), Preference::NotMatching(id)],
        None => vec![Preference::Any],
    };

    let cities = split(criteria.city_id);
    split(criteria.brand_id)
        .into_iter()
        .flat_map(|brand| cities.iter().map(move |city| (brand, *city)))
        .collect()
}
