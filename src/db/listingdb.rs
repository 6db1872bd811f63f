use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::db::DBClient,
    models::listingmodel::{CandidateItem, ListingRow, LIVE_LISTING_STATUS},
};

/// Restricts a query to listings that do (or don't) carry a given id.
/// `NotMatching` also keeps listings where the column is NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    #[default]
    Any,
    Matching(Uuid),
    NotMatching(Uuid),
}

impl Preference {
    pub fn accepts(&self, value: Option<Uuid>) -> bool {
        match self {
            Preference::Any => true,
            Preference::Matching(id) => value == Some(*id),
            Preference::NotMatching(id) => value != Some(*id),
        }
    }

    fn binds(&self) -> (Option<Uuid>, bool) {
        match self {
            Preference::Any => (None, true),
            Preference::Matching(id) => (Some(*id), true),
            Preference::NotMatching(id) => (Some(*id), false),
        }
    }
}

/// Inclusive year bounds; listings without a year always pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl YearWindow {
    pub fn accepts(&self, year: Option<i32>) -> bool {
        match year {
            None => true,
            Some(year) => {
                self.min.map_or(true, |min| year >= min) && self.max.map_or(true, |max| year <= max)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub exclude_owner: Uuid,
    pub exclude_ids: Vec<Uuid>,
    /// Only listings created strictly after this instant.
    pub created_after: Option<DateTime<Utc>>,
    pub year_window: Option<YearWindow>,
    pub brand: Preference,
    pub city: Preference,
    pub limit: i64,
}

impl CandidateQuery {
    /// In-process twin of the SQL WHERE clause.
    pub fn accepts(&self, item: &CandidateItem) -> bool {
        item.is_live()
            && item.user_id != self.exclude_owner
            && !self.exclude_ids.contains(&item.id)
            && self.created_after.map_or(true, |since| item.created_at > since)
            && self.year_window.map_or(true, |window| window.accepts(item.year))
            && self.brand.accepts(item.brand_id)
            && self.city.accepts(item.city_id)
    }
}

#[async_trait]
pub trait ListingExt {
    /// Live listings passing `query`, newest first, at most `query.limit`.
    async fn find_candidate_listings(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateItem>, sqlx::Error>;
}

#[async_trait]
impl ListingExt for DBClient {
    async fn find_candidate_listings(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateItem>, sqlx::Error> {
        if query.limit <= 0 {
            return Ok(vec![]);
        }

        let (brand_id, brand_wanted) = query.brand.binds();
        let (city_id, city_wanted) = query.city.binds();
        let (min_year, max_year) = query
            .year_window
            .map(|window| (window.min, window.max))
            .unwrap_or((None, None));

        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT id, user_id, status, kind, price, starting_price, current_bid, minimum_offer,
                   brand_id, model_id, category_id, city_id, country_id, year, created_at
            FROM listings
            WHERE status = $1
            AND user_id <> $2
            AND NOT (id = ANY($3))
            AND ($4::timestamptz IS NULL OR created_at > $4)
            AND ($5::int IS NULL OR year IS NULL OR year >= $5)
            AND ($6::int IS NULL OR year IS NULL OR year <= $6)
            AND ($7::uuid IS NULL OR (brand_id IS NOT DISTINCT FROM $7) = $8)
            AND ($9::uuid IS NULL OR (city_id IS NOT DISTINCT FROM $9) = $10)
            ORDER BY created_at DESC, id
            LIMIT $11
            "#,
        )
        .bind(LIVE_LISTING_STATUS)
        .bind(query.exclude_owner)
        .bind(&query.exclude_ids)
        .bind(query.created_after)
        .bind(min_year)
        .bind(max_year)
        .bind(brand_id)
        .bind(brand_wanted)
        .bind(city_id)
        .bind(city_wanted)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CandidateItem::from).collect())
    }
}
