//! # stash-db
//!
//! PostgreSQL database layer for stash.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for items, reference entities and import logs
//! - Wiring of those repositories into the `stash-core` import/export services
//!
//! ## Example
//!
//! ```rust,ignore
//! use stash_db::{Database, ImportRequest, DataFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/stash").await?;
//!     let summary = db
//!         .import_service()
//!         .run(
//!             owner,
//!             ImportRequest {
//!                 file_name: "items.csv".to_string(),
//!                 format: DataFormat::Csv,
//!                 bytes,
//!             },
//!         )
//!         .await?;
//!     println!("{}", summary.success_message());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod import_logs;
pub mod items;
pub mod pool;
pub mod references;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use stash_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use import_logs::PgImportLogRepository;
pub use items::PgItemRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use references::PgReferenceRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Items with their labels, attachments and maintenance records.
    pub items: Arc<PgItemRepository>,
    /// Locations, labels and currencies.
    pub references: Arc<PgReferenceRepository>,
    /// Import and export audit records.
    pub import_logs: Arc<PgImportLogRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            items: Arc::new(PgItemRepository::new(pool.clone())),
            references: Arc::new(PgReferenceRepository::new(pool.clone())),
            import_logs: Arc::new(PgImportLogRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Get-or-create resolver backed by this database.
    pub fn resolver(&self) -> ReferenceResolver {
        ReferenceResolver::new(self.references.clone())
    }

    /// Import orchestrator backed by this database.
    pub fn import_service(&self) -> ImportService {
        ImportService::new(
            self.items.clone(),
            self.resolver(),
            self.import_logs.clone(),
        )
    }

    /// Exporter backed by this database.
    pub fn export_service(&self) -> ExportService {
        ExportService::new(self.items.clone(), self.import_logs.clone())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            items: self.items.clone(),
            references: self.references.clone(),
            import_logs: self.import_logs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("drill"), "drill");
    }
}
