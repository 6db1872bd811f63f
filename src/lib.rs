pub mod config;
pub mod db;
pub mod models;
pub mod service;

use std::sync::Arc;

use config::Config;
use db::db::DBClient;
use service::{
    maintenance_service::MaintenanceService,
    matching_service::MatchingService,
    notification_service::{LogNotifier, MatchNotifier, RedisNotifier},
    scoring::{Scorer, WeightTable},
};

pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    // Services
    pub matching_service: Arc<MatchingService<DBClient>>,
    pub maintenance_service: Arc<MaintenanceService<DBClient>>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client_arc = Arc::new(db_client);

        let notifier: Arc<dyn MatchNotifier> = match &db_client_arc.redis_client {
            Some(conn) => Arc::new(RedisNotifier::new(conn.clone())),
            None => Arc::new(LogNotifier),
        };

        let matching_service = Arc::new(MatchingService::new(
            db_client_arc.clone(),
            Scorer::new(WeightTable::default()),
            notifier,
            config.matching.clone(),
        ));
        let maintenance_service = Arc::new(MaintenanceService::new(db_client_arc.clone()));

        Self {
            env: config,
            db_client: db_client_arc,
            matching_service,
            maintenance_service,
        }
    }
}
