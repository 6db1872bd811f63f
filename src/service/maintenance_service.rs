// service/maintenance_service.rs
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    db::matchdb::MatchExt,
    models::matchmodel::MaintenanceReport,
    service::error::ServiceError,
};

#[derive(Debug, Clone)]
pub struct MaintenanceService<S> {
    store: Arc<S>,
}

impl<S> MaintenanceService<S>
where
    S: MatchExt + Send + Sync,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Deletes dismissed matches untouched for more than `older_than_days`.
    pub async fn purge_old_dismissed(&self, older_than_days: i64) -> Result<u64, ServiceError> {
        if older_than_days < 0 {
            return Err(ServiceError::Validation(format!(
                "Retention must not be negative, got {} days",
                older_than_days
            )));
        }
        let cutoff = Utc::now() - Duration::days(older_than_days);
        let purged = self.store.purge_dismissed_before(cutoff).await?;
        tracing::info!("FindIt cleanup: purged {} dismissed matches older than {}", purged, cutoff);
        Ok(purged)
    }

    /// Deletes matches pointing at listings that are gone or no longer published.
    pub async fn purge_invalidated(&self) -> Result<u64, ServiceError> {
        let purged = self.store.purge_invalidated_matches().await?;
        tracing::info!("FindIt cleanup: purged {} matches with invalidated listings", purged);
        Ok(purged)
    }

    pub async fn run_cleanup(&self, retention_days: i64) -> Result<MaintenanceReport, ServiceError> {
        let dismissed_purged = self.purge_old_dismissed(retention_days).await?;
        let invalidated_purged = self.purge_invalidated().await?;
        Ok(MaintenanceReport {
            dismissed_purged,
            invalidated_purged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memorydb::MemoryStore;
    use crate::models::{
        criteriamodel::MatchCriteria,
        listingmodel::{CandidateItem, ListingPricing, LIVE_LISTING_STATUS},
        matchmodel::ScoredCandidate,
    };
    use uuid::Uuid;

    fn live_listing() -> CandidateItem {
        CandidateItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: LIVE_LISTING_STATUS.to_string(),
            pricing: ListingPricing::fixed(1_000),
            brand_id: None,
            model_id: None,
            category_id: None,
            city_id: None,
            country_id: None,
            year: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> (Arc<MemoryStore>, MatchCriteria, Vec<CandidateItem>) {
        let store = Arc::new(MemoryStore::new());
        let criteria = MatchCriteria::new_active(Uuid::new_v4());
        store.add_criteria(criteria.clone());

        let listings: Vec<CandidateItem> = (0..3).map(|_| live_listing()).collect();
        let scored: Vec<ScoredCandidate> = listings
            .iter()
            .map(|l| ScoredCandidate { listing_id: l.id, score: 60 })
            .collect();
        for listing in &listings {
            store.add_listing(listing.clone());
        }
        store.insert_matches(criteria.id, &scored).await.unwrap();
        (store, criteria, listings)
    }

    #[tokio::test]
    async fn only_old_dismissed_matches_are_purged() {
        let (store, criteria, _) = seeded().await;
        let records = store.matches_for(criteria.id);

        store.set_match_dismissed(criteria.id, records[0].id, true).await.unwrap();
        store.set_match_dismissed(criteria.id, records[1].id, true).await.unwrap();
        store.set_match_updated_at(records[0].id, Utc::now() - Duration::days(45));

        let purged = MaintenanceService::new(store.clone()).purge_old_dismissed(30).await.unwrap();
        assert_eq!(purged, 1);

        let remaining: Vec<Uuid> = store.matches_for(criteria.id).iter().map(|m| m.id).collect();
        assert_eq!(remaining, vec![records[1].id, records[2].id]);
    }

    #[tokio::test]
    async fn matches_on_unpublished_or_deleted_listings_are_purged() {
        let (store, criteria, listings) = seeded().await;
        store.set_listing_status(listings[0].id, "sold");
        store.remove_listing(listings[1].id);

        let report = MaintenanceService::new(store.clone()).run_cleanup(30).await.unwrap();
        assert_eq!(report.invalidated_purged, 2);
        assert_eq!(report.dismissed_purged, 0);

        let remaining = store.matches_for(criteria.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].listing_id, listings[2].id);
        assert_eq!(store.criteria(criteria.id).unwrap().matches_count, 1);
    }

    #[tokio::test]
    async fn negative_retention_is_rejected() {
        let (store, _, _) = seeded().await;
        let result = MaintenanceService::new(store).purge_old_dismissed(-1).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
