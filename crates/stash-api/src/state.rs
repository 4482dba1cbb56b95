//! Shared handler state.

use std::sync::Arc;

use stash_core::memory::MemoryStore;
use stash_core::{ExportService, ImportLogRepository, ImportService, ReferenceResolver};
use stash_db::Database;

use crate::config::ApiConfig;

/// Services and configuration cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub imports: ImportService,
    pub exports: ExportService,
    pub resolver: ReferenceResolver,
    pub import_logs: Arc<dyn ImportLogRepository>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// State backed by PostgreSQL.
    pub fn from_database(db: &Database, config: ApiConfig) -> Self {
        Self {
            imports: db.import_service(),
            exports: db.export_service(),
            resolver: db.resolver(),
            import_logs: db.import_logs.clone(),
            config: Arc::new(config),
        }
    }

    /// State backed by an in-memory store, for tests and demos.
    pub fn in_memory(store: Arc<MemoryStore>, config: ApiConfig) -> Self {
        let resolver = ReferenceResolver::new(store.clone());
        Self {
            imports: ImportService::new(store.clone(), resolver.clone(), store.clone()),
            exports: ExportService::new(store.clone(), store.clone()),
            resolver,
            import_logs: store,
            config: Arc::new(config),
        }
    }
}
