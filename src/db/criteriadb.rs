use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::db::DBClient,
    models::criteriamodel::{MatchCriteria, RequestStatus},
};

#[async_trait]
pub trait CriteriaExt {
    async fn get_criteria_by_id(
        &self,
        criteria_id: Uuid,
    ) -> Result<Option<MatchCriteria>, sqlx::Error>;

    /// One page of requests that are active and unexpired at `now`, ordered by
    /// id and starting strictly after `after`.
    async fn get_active_criteria_page(
        &self,
        after: Option<Uuid>,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchCriteria>, sqlx::Error>;

    async fn update_last_matched_at(
        &self,
        criteria_id: Uuid,
        matched_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl CriteriaExt for DBClient {
    async fn get_criteria_by_id(
        &self,
        criteria_id: Uuid,
    ) -> Result<Option<MatchCriteria>, sqlx::Error> {
        sqlx::query_as::<_, MatchCriteria>(
            r#"
            SELECT * FROM findit_requests
            WHERE id = $1
            "#,
        )
        .bind(criteria_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_active_criteria_page(
        &self,
        after: Option<Uuid>,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchCriteria>, sqlx::Error> {
        sqlx::query_as::<_, MatchCriteria>(
            r#"
            SELECT * FROM findit_requests
            WHERE status = $1
            AND (expires_at IS NULL OR expires_at > $2)
            AND ($3::uuid IS NULL OR id > $3)
            ORDER BY id
            LIMIT $4
            "#,
        )
        .bind(RequestStatus::Active)
        .bind(now)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_last_matched_at(
        &self,
        criteria_id: Uuid,
        matched_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE findit_requests
            SET last_matched_at = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(matched_at)
        .bind(criteria_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
