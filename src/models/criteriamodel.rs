use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "findit_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Draft,
    Active,
    Closed,
    Expired,
}

impl RequestStatus {
    pub fn to_str(&self) -> &str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Active => "active",
            RequestStatus::Closed => "closed",
            RequestStatus::Expired => "expired",
        }
    }
}

/// A user's standing FindIt request. Every constraint is optional; an unset
/// constraint means "don't filter or score on this".
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct MatchCriteria {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: RequestStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_matched_at: Option<DateTime<Utc>>,
    pub matches_count: i32,

    // Identity constraints
    pub brand_id: Option<Uuid>,
    pub model_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub country_id: Option<Uuid>,

    // Ranges
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub min_mileage: Option<i64>,
    pub max_mileage: Option<i64>,

    // Descriptive
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
    pub body_type: Option<String>,
    pub color: Option<String>,
    pub condition: Option<String>,
    pub condition_rating: Option<i16>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchCriteria {
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Eligible iff the request is active and not past its expiry.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Active
            && self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    pub fn has_price_range(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some()
    }

    pub fn has_year_range(&self) -> bool {
        self.min_year.is_some() || self.max_year.is_some()
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some() || self.condition_rating.is_some()
    }

    /// Lower bound for incremental scans: the last run, or creation if the
    /// request was never matched.
    pub fn incremental_since(&self) -> DateTime<Utc> {
        self.last_matched_at.unwrap_or(self.created_at)
    }

    /// Bare active request owned by `user_id`, no constraints set.
    pub fn new_active(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: RequestStatus::Active,
            expires_at: None,
            last_matched_at: None,
            matches_count: 0,
            brand_id: None,
            model_id: None,
            category_id: None,
            city_id: None,
            country_id: None,
            min_price: None,
            max_price: None,
            min_year: None,
            max_year: None,
            min_mileage: None,
            max_mileage: None,
            transmission: None,
            fuel_type: None,
            body_type: None,
            color: None,
            condition: None,
            condition_rating: None,
            created_at: now,
            updated_at: now,
        }
    }
}
