use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("FindIt request {0} not found")]
    CriteriaNotFound(Uuid),

    #[error("Match {0} not found")]
    MatchNotFound(Uuid),

    #[error("Matching run for request {criteria_id} timed out after {seconds}s")]
    Timeout { criteria_id: Uuid, seconds: u64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl From<redis::RedisError> for ServiceError {
    fn from(err: redis::RedisError) -> Self {
        ServiceError::Notification(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Notification(err.to_string())
    }
}

impl ServiceError {
    /// Failures that a later run may not hit again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Database(_) | ServiceError::Timeout { .. } | ServiceError::Notification(_)
        )
    }
}
