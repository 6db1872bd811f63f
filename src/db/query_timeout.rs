// Timeout protection for matching runs
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use crate::service::error::ServiceError;

pub struct QueryTimeout;

impl QueryTimeout {
    /// Run one request's work under a deadline so a slow query can't stall a batch.
    pub async fn execute_with_timeout<F, T>(
        criteria_id: Uuid,
        query_fn: F,
        timeout_duration: Duration,
    ) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match timeout(timeout_duration, query_fn).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                criteria_id,
                seconds: timeout_duration.as_secs(),
            }),
        }
    }

    /// Default budget for a single request's run
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
}
