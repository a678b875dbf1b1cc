use crate::{config::AppConfig, db::DbPool, services::store::DocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub store: DocumentStore,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, store: DocumentStore) -> Self {
        Self { config, db, store }
    }
}
