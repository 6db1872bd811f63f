use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::db::DBClient,
    models::{
        listingmodel::LIVE_LISTING_STATUS,
        matchmodel::{MatchRecord, ScoredCandidate},
    },
};

#[async_trait]
pub trait MatchExt {
    /// Every listing already recorded for the request, dismissed ones included.
    async fn get_matched_listing_ids(
        &self,
        criteria_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error>;

    /// Creates one record per candidate and refreshes the request's counter in
    /// the same transaction. Pairs that already exist are skipped; only the
    /// records actually created are returned.
    async fn insert_matches(
        &self,
        criteria_id: Uuid,
        matches: &[ScoredCandidate],
    ) -> Result<Vec<MatchRecord>, sqlx::Error>;

    /// Recomputes the denormalized counter from the stored rows.
    async fn update_match_counter(
        &self,
        criteria_id: Uuid,
    ) -> Result<i32, sqlx::Error>;

    /// Deletes every record of the request and zeroes its counter.
    async fn clear_matches(
        &self,
        criteria_id: Uuid,
    ) -> Result<u64, sqlx::Error>;

    async fn set_match_dismissed(
        &self,
        criteria_id: Uuid,
        match_id: Uuid,
        dismissed: bool,
    ) -> Result<Option<MatchRecord>, sqlx::Error>;

    async fn get_matches_for_criteria(
        &self,
        criteria_id: Uuid,
        include_dismissed: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchRecord>, sqlx::Error>;

    async fn mark_matches_notified(
        &self,
        criteria_id: Uuid,
        listing_ids: &[Uuid],
        notified_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    async fn purge_dismissed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    /// Deletes records whose listing is gone or no longer live.
    async fn purge_invalidated_matches(&self) -> Result<u64, sqlx::Error>;
}

impl DBClient {
    async fn recount_matches_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        criteria_id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE findit_requests
            SET matches_count = (
                SELECT COUNT(*)::int FROM findit_matches
                WHERE criteria_id = $1 AND dismissed = FALSE
            ),
            updated_at = NOW()
            WHERE id = $1
            RETURNING matches_count
            "#,
        )
        .bind(criteria_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(count.unwrap_or(0))
    }
}

#[async_trait]
impl MatchExt for DBClient {
    async fn get_matched_listing_ids(
        &self,
        criteria_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"SELECT listing_id FROM findit_matches WHERE criteria_id = $1"#,
        )
        .bind(criteria_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn insert_matches(
        &self,
        criteria_id: Uuid,
        matches: &[ScoredCandidate],
    ) -> Result<Vec<MatchRecord>, sqlx::Error> {
        if matches.is_empty() {
            return Ok(vec![]);
        }

        let listing_ids: Vec<Uuid> = matches.iter().map(|m| m.listing_id).collect();
        let scores: Vec<i32> = matches.iter().map(|m| m.score).collect();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, MatchRecord>(
            r#"
            INSERT INTO findit_matches (criteria_id, listing_id, score)
            SELECT $1, t.listing_id, t.score
            FROM UNNEST($2::uuid[], $3::int[]) AS t(listing_id, score)
            ON CONFLICT (criteria_id, listing_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(criteria_id)
        .bind(&listing_ids)
        .bind(&scores)
        .fetch_all(&mut *tx)
        .await?;

        Self::recount_matches_tx(&mut tx, criteria_id).await?;

        tx.commit().await?;

        Ok(inserted)
    }

    async fn update_match_counter(
        &self,
        criteria_id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let count = Self::recount_matches_tx(&mut tx, criteria_id).await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn clear_matches(
        &self,
        criteria_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(r#"DELETE FROM findit_matches WHERE criteria_id = $1"#)
            .bind(criteria_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            r#"
            UPDATE findit_requests
            SET matches_count = 0, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(criteria_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(deleted)
    }

    async fn set_match_dismissed(
        &self,
        criteria_id: Uuid,
        match_id: Uuid,
        dismissed: bool,
    ) -> Result<Option<MatchRecord>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, MatchRecord>(
            r#"
            UPDATE findit_matches
            SET dismissed = $1, updated_at = NOW()
            WHERE id = $2 AND criteria_id = $3
            RETURNING *
            "#,
        )
        .bind(dismissed)
        .bind(match_id)
        .bind(criteria_id)
        .fetch_optional(&mut *tx)
        .await?;

        if record.is_some() {
            Self::recount_matches_tx(&mut tx, criteria_id).await?;
        }

        tx.commit().await?;

        Ok(record)
    }

    async fn get_matches_for_criteria(
        &self,
        criteria_id: Uuid,
        include_dismissed: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchRecord>, sqlx::Error> {
        sqlx::query_as::<_, MatchRecord>(
            r#"
            SELECT * FROM findit_matches
            WHERE criteria_id = $1
            AND ($2 OR dismissed = FALSE)
            ORDER BY score DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(criteria_id)
        .bind(include_dismissed)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_matches_notified(
        &self,
        criteria_id: Uuid,
        listing_ids: &[Uuid],
        notified_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        if listing_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE findit_matches
            SET notified_at = $1, updated_at = NOW()
            WHERE criteria_id = $2 AND listing_id = ANY($3)
            "#,
        )
        .bind(notified_at)
        .bind(criteria_id)
        .bind(listing_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_dismissed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM findit_matches
            WHERE dismissed = TRUE
            AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_invalidated_matches(&self) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let affected: Vec<Uuid> = sqlx::query_scalar(
            r#"
            DELETE FROM findit_matches m
            WHERE NOT EXISTS (
                SELECT 1 FROM listings l
                WHERE l.id = m.listing_id AND l.status = $1
            )
            RETURNING m.criteria_id
            "#,
        )
        .bind(LIVE_LISTING_STATUS)
        .fetch_all(&mut *tx)
        .await?;

        let criteria_ids: BTreeSet<Uuid> = affected.iter().copied().collect();
        for criteria_id in criteria_ids {
            Self::recount_matches_tx(&mut tx, criteria_id).await?;
        }

        tx.commit().await?;

        Ok(affected.len() as u64)
    }
}
