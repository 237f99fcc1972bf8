use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::scan::manager_override::ManagerOverride;
use crate::scan::service::ScanService;
use crate::store::postgres::PgStore;
use crate::store::snapshot::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub scans: Arc<ScanService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: &Config) -> Self {
        let store = Arc::new(PgStore::new(db_pool.clone()));
        let snapshots = SnapshotStore::new(store.clone(), store.clone(), config.retention);
        let overrides = ManagerOverride::new(&config.manager_badges, config.badge_scan_window_ms);

        Self {
            db_pool,
            scans: Arc::new(ScanService::new(snapshots, store, overrides)),
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
        }
    }
}
