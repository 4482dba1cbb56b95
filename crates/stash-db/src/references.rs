//! Location, label and currency repository implementation.
//!
//! Get-or-create relies on the per-owner unique constraints: the insert is
//! attempted with `ON CONFLICT DO NOTHING` and, when another writer got
//! there first, the winning row is read back.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use stash_core::{
    new_v7, Currency, Error, Label, Location, ReferenceDescriptor, ReferenceKind,
    ReferenceRepository, ResolvedReference, Result,
};

/// PostgreSQL implementation of ReferenceRepository.
pub struct PgReferenceRepository {
    pool: Pool<Postgres>,
}

impl PgReferenceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Read back the id for a natural key after a conflicting insert.
    async fn select_existing(
        &self,
        owner: Uuid,
        kind: ReferenceKind,
        key: &str,
    ) -> Result<Option<Uuid>> {
        let sql = match kind {
            ReferenceKind::Location => "SELECT id FROM location WHERE owner_id = $1 AND name = $2",
            ReferenceKind::Label => "SELECT id FROM label WHERE owner_id = $1 AND name = $2",
            ReferenceKind::Currency => "SELECT id FROM currency WHERE owner_id = $1 AND code = $2",
        };
        let row = sqlx::query(sql)
            .bind(owner)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("id")))
    }

    /// Insert the descriptor's entity unless its key exists. Returns the new
    /// id, or `None` when the row was already there.
    async fn insert_if_absent(
        &self,
        owner: Uuid,
        descriptor: &ReferenceDescriptor,
    ) -> Result<Option<Uuid>> {
        let id = new_v7();
        let now = Utc::now();

        let query = match descriptor {
            ReferenceDescriptor::Location { name, description } => sqlx::query(
                "INSERT INTO location (id, owner_id, name, description, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $5)
                 ON CONFLICT (owner_id, name) DO NOTHING
                 RETURNING id",
            )
            .bind(id)
            .bind(owner)
            .bind(name)
            .bind(description)
            .bind(now),
            ReferenceDescriptor::Label { name, color } => sqlx::query(
                "INSERT INTO label (id, owner_id, name, color, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $5)
                 ON CONFLICT (owner_id, name) DO NOTHING
                 RETURNING id",
            )
            .bind(id)
            .bind(owner)
            .bind(name)
            .bind(color)
            .bind(now),
            ReferenceDescriptor::Currency { code, name, symbol } => sqlx::query(
                "INSERT INTO currency (id, owner_id, name, code, symbol, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $6)
                 ON CONFLICT (owner_id, code) DO NOTHING
                 RETURNING id",
            )
            .bind(id)
            .bind(owner)
            .bind(name)
            .bind(code)
            .bind(symbol)
            .bind(now),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("id")))
    }
}

fn location_from_row(r: &PgRow) -> Location {
    Location {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn label_from_row(r: &PgRow) -> Label {
    Label {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        name: r.get("name"),
        color: r.get("color"),
        description: r.get("description"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

pub(crate) fn currency_from_row(r: &PgRow) -> Currency {
    Currency {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        name: r.get("name"),
        code: r.get("code"),
        symbol: r.get("symbol"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[async_trait]
impl ReferenceRepository for PgReferenceRepository {
    async fn resolve_or_create(
        &self,
        owner: Uuid,
        descriptor: &ReferenceDescriptor,
    ) -> Result<ResolvedReference> {
        let kind = descriptor.kind();
        let key = descriptor.natural_key();

        if let Some(id) = self.select_existing(owner, kind, key).await? {
            return Ok(ResolvedReference { id, created: false });
        }

        if let Some(id) = self.insert_if_absent(owner, descriptor).await? {
            debug!(
                subsystem = "database",
                component = "references",
                op = "insert",
                reference_kind = %kind,
                owner_id = %owner,
                "Inserted {} '{}'",
                kind,
                key
            );
            return Ok(ResolvedReference { id, created: true });
        }

        // Lost the race: a concurrent writer inserted the same key.
        self.select_existing(owner, kind, key)
            .await?
            .map(|id| ResolvedReference { id, created: false })
            .ok_or_else(|| {
                Error::Conflict(format!("{} '{}' was removed while resolving", kind, key))
            })
    }

    async fn delete(&self, owner: Uuid, kind: ReferenceKind, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let clear: &[&str] = match kind {
            ReferenceKind::Location => {
                &["UPDATE item SET location_id = NULL WHERE location_id = $1 AND owner_id = $2"]
            }
            ReferenceKind::Label => &["DELETE FROM item_label WHERE label_id = $1
                   AND item_id IN (SELECT id FROM item WHERE owner_id = $2)"],
            ReferenceKind::Currency => &[
                "UPDATE item SET purchase_currency_id = NULL
                 WHERE purchase_currency_id = $1 AND owner_id = $2",
                "UPDATE item SET sold_currency_id = NULL
                 WHERE sold_currency_id = $1 AND owner_id = $2",
                "UPDATE item SET insured_currency_id = NULL
                 WHERE insured_currency_id = $1 AND owner_id = $2",
                "UPDATE maintenance_record SET currency_id = NULL
                 WHERE currency_id = $1 AND owner_id = $2",
            ],
        };
        let remove = match kind {
            ReferenceKind::Location => "DELETE FROM location WHERE id = $1 AND owner_id = $2",
            ReferenceKind::Label => "DELETE FROM label WHERE id = $1 AND owner_id = $2",
            ReferenceKind::Currency => "DELETE FROM currency WHERE id = $1 AND owner_id = $2",
        };

        for sql in clear {
            sqlx::query(sql)
                .bind(id)
                .bind(owner)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        let deleted = sqlx::query(remove)
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(Error::Database)?;
            return Err(Error::NotFound(format!("{} {}", kind, id)));
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn list_locations(&self, owner: Uuid) -> Result<Vec<Location>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, name, description, created_at, updated_at
             FROM location WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(location_from_row).collect())
    }

    async fn list_labels(&self, owner: Uuid) -> Result<Vec<Label>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, name, color, description, created_at, updated_at
             FROM label WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(label_from_row).collect())
    }

    async fn list_currencies(&self, owner: Uuid) -> Result<Vec<Currency>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, name, code, symbol, created_at, updated_at
             FROM currency WHERE owner_id = $1 ORDER BY code",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(currency_from_row).collect())
    }
}
