use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::alerting::Ingestor;
use crate::config::Config;
use crate::notify::NotificationHub;
use crate::services::PgStore;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub store: Arc<PgStore>,
    pub hub: Arc<NotificationHub>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let store = Arc::new(PgStore::new(db.clone(), config.threshold_cache_ttl()));
        let hub = Arc::new(NotificationHub::new(config.notify_channel_capacity));
        // The ingestor only sees the collaborator traits
        let ingestor = Arc::new(Ingestor::new(store.clone(), hub.clone()));

        Self {
            db,
            config: Arc::new(config),
            store,
            hub,
            ingestor,
        }
    }
}
