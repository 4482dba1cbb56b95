//! Import log repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use stash_core::{
    new_v7, Error, ImportLog, ImportLogCompletion, ImportLogRepository, ImportStatus,
    ListImportLogsRequest, NewImportLog, OperationKind, Result,
};

const LOG_COLUMNS: &str = "id, owner_id, file_name, file_size, import_type, status, \
     items_created, items_updated, items_failed, error_message, created_at, completed_at";

/// PostgreSQL implementation of ImportLogRepository.
pub struct PgImportLogRepository {
    pool: Pool<Postgres>,
}

impl PgImportLogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn log_from_row(r: &PgRow) -> Result<ImportLog> {
    let import_type: String = r.get("import_type");
    let status: String = r.get("status");
    Ok(ImportLog {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        file_name: r.get("file_name"),
        file_size: r.get("file_size"),
        import_type: import_type
            .parse::<OperationKind>()
            .map_err(Error::Internal)?,
        status: status.parse::<ImportStatus>().map_err(Error::Internal)?,
        items_created: r.get("items_created"),
        items_updated: r.get("items_updated"),
        items_failed: r.get("items_failed"),
        error_message: r.get("error_message"),
        created_at: r.get("created_at"),
        completed_at: r.get("completed_at"),
    })
}

#[async_trait]
impl ImportLogRepository for PgImportLogRepository {
    async fn start(&self, owner: Uuid, log: NewImportLog) -> Result<ImportLog> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO import_log (id, owner_id, file_name, file_size, import_type, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(new_v7())
        .bind(owner)
        .bind(&log.file_name)
        .bind(log.file_size)
        .bind(log.import_type.as_str())
        .bind(ImportStatus::InProgress.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        log_from_row(&row)
    }

    async fn complete(
        &self,
        owner: Uuid,
        id: Uuid,
        completion: ImportLogCompletion,
    ) -> Result<ImportLog> {
        // completed_at IS NULL makes completion a one-shot transition.
        let row = sqlx::query(&format!(
            r#"
            UPDATE import_log SET
                status = $3, items_created = $4, items_updated = $5, items_failed = $6,
                error_message = $7, completed_at = $8
            WHERE id = $1 AND owner_id = $2 AND completed_at IS NULL
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(completion.status.as_str())
        .bind(completion.items_created)
        .bind(completion.items_updated)
        .bind(completion.items_failed)
        .bind(&completion.error_message)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => log_from_row(&row),
            None => match self.get(owner, id).await? {
                Some(_) => Err(Error::InvalidInput(format!(
                    "Import log {} is already complete",
                    id
                ))),
                None => Err(Error::NotFound(format!("import log {}", id))),
            },
        }
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<ImportLog>> {
        let row = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM import_log WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(log_from_row).transpose()
    }

    async fn list(&self, owner: Uuid, req: ListImportLogsRequest) -> Result<Vec<ImportLog>> {
        let req = req.clamped();
        // ORDER BY comes from a closed enum, never from request text.
        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM import_log
             WHERE owner_id = $1
             ORDER BY {}
             LIMIT $2 OFFSET $3",
            req.ordering.order_by_sql()
        ))
        .bind(owner)
        .bind(req.limit)
        .bind(req.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(log_from_row).collect()
    }
}
