// service/notification_service.rs
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::{models::matchmodel::NewMatchesNotice, service::error::ServiceError};

/// Redis list an external delivery worker (push / email / in-app) pops from.
pub const MATCH_EVENTS_QUEUE: &str = "findit:match_events";

/// Boundary towards notification delivery. The engine only reports that a
/// request got new matches; how the user hears about it is not its concern.
#[async_trait]
pub trait MatchNotifier: Send + Sync {
    async fn notify_new_matches(&self, notice: &NewMatchesNotice) -> Result<(), ServiceError>;
}

/// Notifier that only logs. Used when Redis isn't configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl MatchNotifier for LogNotifier {
    async fn notify_new_matches(&self, notice: &NewMatchesNotice) -> Result<(), ServiceError> {
        tracing::info!(
            "FindIt notification: {} new matches for request {} (user {}), best: {:?}",
            notice.new_matches,
            notice.criteria_id,
            notice.user_id,
            notice.best_match.map(|m| (m.listing_id, m.score))
        );
        Ok(())
    }
}

/// Pushes notices as JSON onto [`MATCH_EVENTS_QUEUE`].
#[derive(Clone)]
pub struct RedisNotifier {
    conn: ConnectionManager,
    queue_key: String,
}

impl RedisNotifier {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            queue_key: MATCH_EVENTS_QUEUE.to_string(),
        }
    }
}

#[async_trait]
impl MatchNotifier for RedisNotifier {
    async fn notify_new_matches(&self, notice: &NewMatchesNotice) -> Result<(), ServiceError> {
        let payload = serde_json::to_string(notice)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(&self.queue_key, payload).await?;

        tracing::info!(
            "FindIt: queued match event for request {} ({} new)",
            notice.criteria_id,
            notice.new_matches
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every notice; optionally fails every call.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub notices: Mutex<Vec<NewMatchesNotice>>,
        pub fail: bool,
    }

    #[async_trait]
    impl MatchNotifier for RecordingNotifier {
        async fn notify_new_matches(&self, notice: &NewMatchesNotice) -> Result<(), ServiceError> {
            self.notices.lock().unwrap().push(notice.clone());
            if self.fail {
                return Err(ServiceError::Notification("delivery backend down".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notice = NewMatchesNotice {
            criteria_id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::new_v4(),
            new_matches: 2,
            best_match: None,
            produced_at: chrono::Utc::now(),
        };
        assert!(LogNotifier.notify_new_matches(&notice).await.is_ok());
    }

    #[test]
    fn notice_payload_is_plain_json() {
        let notice = NewMatchesNotice {
            criteria_id: uuid::Uuid::nil(),
            user_id: uuid::Uuid::nil(),
            new_matches: 1,
            best_match: Some(crate::models::matchmodel::ScoredCandidate {
                listing_id: uuid::Uuid::nil(),
                score: 88,
            }),
            produced_at: chrono::Utc::now(),
        };
        let payload: serde_json::Value = serde_json::to_value(&notice).unwrap();
        assert_eq!(payload["new_matches"], 1);
        assert_eq!(payload["best_match"]["score"], 88);
    }
}
