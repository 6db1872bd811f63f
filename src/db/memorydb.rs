// In-memory stand-in for the Postgres tables, used by the service tests.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::{
        criteriadb::CriteriaExt,
        listingdb::{CandidateQuery, ListingExt},
        matchdb::MatchExt,
    },
    models::{
        criteriamodel::MatchCriteria,
        listingmodel::CandidateItem,
        matchmodel::{MatchRecord, ScoredCandidate},
    },
};

#[derive(Default)]
pub struct MemoryState {
    pub listings: Vec<CandidateItem>,
    pub criteria: HashMap<Uuid, MatchCriteria>,
    pub matches: Vec<MatchRecord>,
    pub failing_owners: HashSet<Uuid>,
    pub failing_inserts: HashSet<Uuid>,
    /// Criteria pages served before paging starts failing.
    pub criteria_pages_left: Option<usize>,
    pub listing_queries: Vec<CandidateQuery>,
}

#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listing(&self, listing: CandidateItem) {
        self.state.lock().unwrap().listings.push(listing);
    }

    pub fn add_criteria(&self, criteria: MatchCriteria) {
        self.state.lock().unwrap().criteria.insert(criteria.id, criteria);
    }

    pub fn criteria(&self, criteria_id: Uuid) -> Option<MatchCriteria> {
        self.state.lock().unwrap().criteria.get(&criteria_id).cloned()
    }

    pub fn matches_for(&self, criteria_id: Uuid) -> Vec<MatchRecord> {
        self.state
            .lock()
            .unwrap()
            .matches
            .iter()
            .filter(|m| m.criteria_id == criteria_id)
            .cloned()
            .collect()
    }

    /// Listing retrieval fails for every request owned by `user_id`.
    pub fn fail_retrieval_for(&self, user_id: Uuid) {
        self.state.lock().unwrap().failing_owners.insert(user_id);
    }

    /// Inserting matches for `criteria_id` fails without touching any state.
    pub fn fail_inserts_for(&self, criteria_id: Uuid) {
        self.state.lock().unwrap().failing_inserts.insert(criteria_id);
    }

    /// Serve `pages` criteria pages, then fail every further page request.
    pub fn fail_criteria_paging_after(&self, pages: usize) {
        self.state.lock().unwrap().criteria_pages_left = Some(pages);
    }

    pub fn set_listing_status(&self, listing_id: Uuid, status: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(listing) = state.listings.iter_mut().find(|l| l.id == listing_id) {
            listing.status = status.to_string();
        }
    }

    pub fn remove_listing(&self, listing_id: Uuid) {
        self.state.lock().unwrap().listings.retain(|l| l.id != listing_id);
    }

    pub fn listing_queries(&self) -> Vec<CandidateQuery> {
        self.state.lock().unwrap().listing_queries.clone()
    }

    pub fn set_match_updated_at(&self, match_id: Uuid, updated_at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.matches.iter_mut().find(|m| m.id == match_id) {
            record.updated_at = updated_at;
        }
    }
}

fn recount(state: &mut MemoryState, criteria_id: Uuid) -> i32 {
    let count = state
        .matches
        .iter()
        .filter(|m| m.criteria_id == criteria_id && !m.dismissed)
        .count() as i32;
    if let Some(criteria) = state.criteria.get_mut(&criteria_id) {
        criteria.matches_count = count;
        criteria.updated_at = Utc::now();
    }
    count
}

#[async_trait]
impl ListingExt for MemoryStore {
    async fn find_candidate_listings(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateItem>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.listing_queries.push(query.clone());

        if state.failing_owners.contains(&query.exclude_owner) {
            return Err(sqlx::Error::Protocol("listing query failed".to_string()));
        }

        let mut items: Vec<CandidateItem> = state
            .listings
            .iter()
            .filter(|item| query.accepts(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        items.truncate(query.limit.max(0) as usize);

        Ok(items)
    }
}

#[async_trait]
impl CriteriaExt for MemoryStore {
    async fn get_criteria_by_id(
        &self,
        criteria_id: Uuid,
    ) -> Result<Option<MatchCriteria>, sqlx::Error> {
        Ok(self.criteria(criteria_id))
    }

    async fn get_active_criteria_page(
        &self,
        after: Option<Uuid>,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchCriteria>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        match state.criteria_pages_left {
            Some(0) => return Err(sqlx::Error::PoolTimedOut),
            Some(left) => state.criteria_pages_left = Some(left - 1),
            None => {}
        }
        let mut page: Vec<MatchCriteria> = state
            .criteria
            .values()
            .filter(|c| c.is_active_at(now))
            .filter(|c| after.map_or(true, |after| c.id > after))
            .cloned()
            .collect();
        page.sort_by_key(|c| c.id);
        page.truncate(limit.max(0) as usize);
        Ok(page)
    }

    async fn update_last_matched_at(
        &self,
        criteria_id: Uuid,
        matched_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(criteria) = state.criteria.get_mut(&criteria_id) {
            criteria.last_matched_at = Some(matched_at);
        }
        Ok(())
    }
}

#[async_trait]
impl MatchExt for MemoryStore {
    async fn get_matched_listing_ids(
        &self,
        criteria_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        Ok(self.matches_for(criteria_id).into_iter().map(|m| m.listing_id).collect())
    }

    async fn insert_matches(
        &self,
        criteria_id: Uuid,
        matches: &[ScoredCandidate],
    ) -> Result<Vec<MatchRecord>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.failing_inserts.contains(&criteria_id) {
            return Err(sqlx::Error::Protocol("match insert failed".to_string()));
        }
        let now = Utc::now();
        let mut inserted = Vec::new();

        for scored in matches {
            let exists = state
                .matches
                .iter()
                .any(|m| m.criteria_id == criteria_id && m.listing_id == scored.listing_id);
            if exists {
                continue;
            }
            let record = MatchRecord {
                id: Uuid::new_v4(),
                criteria_id,
                listing_id: scored.listing_id,
                score: scored.score,
                dismissed: false,
                notified_at: None,
                created_at: now,
                updated_at: now,
            };
            state.matches.push(record.clone());
            inserted.push(record);
        }

        recount(&mut state, criteria_id);
        Ok(inserted)
    }

    async fn update_match_counter(
        &self,
        criteria_id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        Ok(recount(&mut state, criteria_id))
    }

    async fn clear_matches(
        &self,
        criteria_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.matches.len();
        state.matches.retain(|m| m.criteria_id != criteria_id);
        let deleted = (before - state.matches.len()) as u64;
        if let Some(criteria) = state.criteria.get_mut(&criteria_id) {
            criteria.matches_count = 0;
        }
        Ok(deleted)
    }

    async fn set_match_dismissed(
        &self,
        criteria_id: Uuid,
        match_id: Uuid,
        dismissed: bool,
    ) -> Result<Option<MatchRecord>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .matches
            .iter_mut()
            .find(|m| m.id == match_id && m.criteria_id == criteria_id)
            .map(|m| {
                m.dismissed = dismissed;
                m.updated_at = Utc::now();
                m.clone()
            });
        if record.is_some() {
            recount(&mut state, criteria_id);
        }
        Ok(record)
    }

    async fn get_matches_for_criteria(
        &self,
        criteria_id: Uuid,
        include_dismissed: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchRecord>, sqlx::Error> {
        let mut records: Vec<MatchRecord> = self
            .matches_for(criteria_id)
            .into_iter()
            .filter(|m| include_dismissed || !m.dismissed)
            .collect();
        records.sort_by(|a, b| b.score.cmp(&a.score).then(b.created_at.cmp(&a.created_at)));
        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn mark_matches_notified(
        &self,
        criteria_id: Uuid,
        listing_ids: &[Uuid],
        notified_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let mut updated = 0;
        for record in state
            .matches
            .iter_mut()
            .filter(|m| m.criteria_id == criteria_id && listing_ids.contains(&m.listing_id))
        {
            record.notified_at = Some(notified_at);
            updated += 1;
        }
        Ok(updated)
    }

    async fn purge_dismissed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.matches.len();
        state.matches.retain(|m| !(m.dismissed && m.updated_at < cutoff));
        Ok((before - state.matches.len()) as u64)
    }

    async fn purge_invalidated_matches(&self) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let live: HashSet<Uuid> = state
            .listings
            .iter()
            .filter(|l| l.is_live())
            .map(|l| l.id)
            .collect();

        let affected: BTreeSet<Uuid> = state
            .matches
            .iter()
            .filter(|m| !live.contains(&m.listing_id))
            .map(|m| m.criteria_id)
            .collect();

        let before = state.matches.len();
        state.matches.retain(|m| live.contains(&m.listing_id));
        let purged = (before - state.matches.len()) as u64;

        for criteria_id in affected {
            recount(&mut state, criteria_id);
        }
        Ok(purged)
    }
}
