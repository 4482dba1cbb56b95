//! Item repository implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use stash_core::{
    new_v7, Attachment, Currency, Error, Item, ItemFilter, ItemGraph, ItemRepository, ItemUpsert,
    Label, Location, MaintenanceEntry, MaintenanceRecord, NewAttachment, NewMaintenanceRecord,
    ResolvedReferences, Result, UpsertOutcome,
};

use crate::escape_like;
use crate::references::currency_from_row;

const ITEM_COLUMNS: &str = "id, owner_id, name, description, quantity, important, \
     purchase_price, purchase_currency_id, purchase_date, purchase_from, \
     manufacturer, model_number, serial_number, notes, warranty_expires, warranty_info, \
     sold, sold_date, sold_price, sold_currency_id, sold_to, \
     insured, insured_value, insured_currency_id, insurance_details, \
     location_id, custom_fields, created_at, updated_at";

const ATTACHMENT_COLUMNS: &str = "id, item_id, owner_id, name, content_type, size, is_primary, \
     file_path, thumbnail_path, created_at";

const MAINTENANCE_COLUMNS: &str = "id, item_id, owner_id, date, cost, currency_id, description, \
     next_service_date, created_at, updated_at";

/// PostgreSQL implementation of ItemRepository.
pub struct PgItemRepository {
    pool: Pool<Postgres>,
}

impl PgItemRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Upsert an item within an existing transaction.
    ///
    /// The target row is locked before it is overwritten, so two writers
    /// updating the same item serialize instead of interleaving the scalar
    /// write and the label replacement.
    pub async fn upsert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: Uuid,
        item: &ItemUpsert,
    ) -> Result<UpsertOutcome> {
        let name = item.fields.validated_name()?;
        check_references_tx(tx, owner, &item.references).await?;

        let existing = match item.fields.id {
            Some(id) => sqlx::query("SELECT id FROM item WHERE id = $1 AND owner_id = $2 FOR UPDATE")
                .bind(id)
                .bind(owner)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?
                .map(|r| r.get::<Uuid, _>("id")),
            None => None,
        };

        let now = Utc::now();
        let outcome = match existing {
            Some(id) => {
                bind_item_columns(
                    sqlx::query(
                        r#"
                        UPDATE item SET
                            name = $3, description = $4, quantity = $5, important = $6,
                            purchase_price = $7, purchase_currency_id = $8, purchase_date = $9,
                            purchase_from = $10, manufacturer = $11, model_number = $12,
                            serial_number = $13, notes = $14, warranty_expires = $15,
                            warranty_info = $16, sold = $17, sold_date = $18, sold_price = $19,
                            sold_currency_id = $20, sold_to = $21, insured = $22,
                            insured_value = $23, insured_currency_id = $24,
                            insurance_details = $25, location_id = $26,
                            custom_fields = COALESCE($27, custom_fields),
                            updated_at = GREATEST($28, updated_at)
                        WHERE id = $1 AND owner_id = $2
                        "#,
                    )
                    .bind(id)
                    .bind(owner),
                    name,
                    item,
                )
                .bind(now)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
                UpsertOutcome::Updated(id)
            }
            None => {
                let id = new_v7();
                bind_item_columns(
                    sqlx::query(
                        r#"
                        INSERT INTO item (
                            id, owner_id, name, description, quantity, important,
                            purchase_price, purchase_currency_id, purchase_date, purchase_from,
                            manufacturer, model_number, serial_number, notes,
                            warranty_expires, warranty_info, sold, sold_date, sold_price,
                            sold_currency_id, sold_to, insured, insured_value,
                            insured_currency_id, insurance_details, location_id,
                            custom_fields, created_at, updated_at
                        )
                        VALUES (
                            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                            $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                            COALESCE($27, '{}'::jsonb), $28, $28
                        )
                        "#,
                    )
                    .bind(id)
                    .bind(owner),
                    name,
                    item,
                )
                .bind(now)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
                UpsertOutcome::Created(id)
            }
        };

        replace_labels_tx(tx, outcome.id(), &item.references.label_ids).await?;

        debug!(
            subsystem = "database",
            component = "items",
            op = "upsert",
            owner_id = %owner,
            item_id = %outcome.id(),
            created = matches!(outcome, UpsertOutcome::Created(_)),
            "Item written"
        );
        Ok(outcome)
    }

    async fn fetch_items(&self, owner: Uuid, filter: &ItemFilter) -> Result<Vec<Item>> {
        let pattern = filter
            .search_term()
            .map(|q| format!("%{}%", escape_like(q)));

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM item i
            WHERE i.owner_id = $1
              AND ($2::uuid IS NULL OR i.location_id = $2)
              AND ($3::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM item_label il WHERE il.item_id = i.id AND il.label_id = $3))
              AND ($4::bool IS NULL OR i.important = $4)
              AND ($5::bool IS NULL OR i.insured = $5)
              AND ($6::bool IS NULL OR i.sold = $6)
              AND ($7::text IS NULL
                   OR i.name ILIKE $7 OR i.description ILIKE $7
                   OR i.serial_number ILIKE $7 OR i.model_number ILIKE $7
                   OR i.manufacturer ILIKE $7 OR i.notes ILIKE $7)
            ORDER BY i.created_at, i.id
            "#
        ))
        .bind(owner)
        .bind(filter.location)
        .bind(filter.label)
        .bind(filter.important)
        .bind(filter.insured)
        .bind(filter.sold)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(item_from_row).collect())
    }

    async fn item_exists(&self, owner: Uuid, id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM item WHERE id = $1 AND owner_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }
}

/// Bind `$3` through `$27` in column order.
fn bind_item_columns<'q>(
    query: Query<'q, Postgres, PgArguments>,
    name: &'q str,
    item: &'q ItemUpsert,
) -> Query<'q, Postgres, PgArguments> {
    let f = &item.fields;
    let r = &item.references;
    query
        .bind(name)
        .bind(&f.description)
        .bind(f.quantity)
        .bind(f.important)
        .bind(&f.purchase_price)
        .bind(r.purchase_currency_id)
        .bind(f.purchase_date)
        .bind(&f.purchase_from)
        .bind(&f.manufacturer)
        .bind(&f.model_number)
        .bind(&f.serial_number)
        .bind(&f.notes)
        .bind(f.warranty_expires)
        .bind(&f.warranty_info)
        .bind(f.sold)
        .bind(f.sold_date)
        .bind(&f.sold_price)
        .bind(r.sold_currency_id)
        .bind(&f.sold_to)
        .bind(f.insured)
        .bind(&f.insured_value)
        .bind(r.insured_currency_id)
        .bind(&f.insurance_details)
        .bind(r.location_id)
        .bind(&f.custom_fields)
}

/// Every referenced id must belong to `owner`.
async fn check_references_tx(
    tx: &mut Transaction<'_, Postgres>,
    owner: Uuid,
    refs: &ResolvedReferences,
) -> Result<()> {
    let exists = |table: &str| {
        format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1 AND owner_id = $2)")
    };

    let mut singles: Vec<(&str, Uuid)> = Vec::new();
    if let Some(id) = refs.location_id {
        singles.push(("location", id));
    }
    for id in [
        refs.purchase_currency_id,
        refs.sold_currency_id,
        refs.insured_currency_id,
    ]
    .into_iter()
    .flatten()
    {
        singles.push(("currency", id));
    }

    for (table, id) in singles {
        let found = sqlx::query_scalar::<_, bool>(&exists(table))
            .bind(id)
            .bind(owner)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;
        if !found {
            return Err(Error::NotFound(format!("{} {}", table, id)));
        }
    }

    if !refs.label_ids.is_empty() {
        let owned: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM label WHERE owner_id = $1 AND id = ANY($2)",
        )
        .bind(owner)
        .bind(&refs.label_ids)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;
        if let Some(missing) = refs.label_ids.iter().find(|id| !owned.contains(id)) {
            return Err(Error::NotFound(format!("label {}", missing)));
        }
    }
    Ok(())
}

async fn replace_labels_tx(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    label_ids: &[Uuid],
) -> Result<()> {
    sqlx::query("DELETE FROM item_label WHERE item_id = $1")
        .bind(item_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

    if !label_ids.is_empty() {
        sqlx::query(
            "INSERT INTO item_label (item_id, label_id)
             SELECT $1, unnest($2::uuid[])
             ON CONFLICT DO NOTHING",
        )
        .bind(item_id)
        .bind(label_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    }
    Ok(())
}

fn item_from_row(r: &PgRow) -> Item {
    Item {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        name: r.get("name"),
        description: r.get("description"),
        quantity: r.get("quantity"),
        important: r.get("important"),
        purchase_price: r.get("purchase_price"),
        purchase_currency_id: r.get("purchase_currency_id"),
        purchase_date: r.get("purchase_date"),
        purchase_from: r.get("purchase_from"),
        manufacturer: r.get("manufacturer"),
        model_number: r.get("model_number"),
        serial_number: r.get("serial_number"),
        notes: r.get("notes"),
        warranty_expires: r.get("warranty_expires"),
        warranty_info: r.get("warranty_info"),
        sold: r.get("sold"),
        sold_date: r.get("sold_date"),
        sold_price: r.get("sold_price"),
        sold_currency_id: r.get("sold_currency_id"),
        sold_to: r.get("sold_to"),
        insured: r.get("insured"),
        insured_value: r.get("insured_value"),
        insured_currency_id: r.get("insured_currency_id"),
        insurance_details: r.get("insurance_details"),
        location_id: r.get("location_id"),
        custom_fields: r.get("custom_fields"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn attachment_from_row(r: &PgRow) -> Attachment {
    Attachment {
        id: r.get("id"),
        item_id: r.get("item_id"),
        owner_id: r.get("owner_id"),
        name: r.get("name"),
        content_type: r.get("content_type"),
        size: r.get("size"),
        is_primary: r.get("is_primary"),
        file_path: r.get("file_path"),
        thumbnail_path: r.get("thumbnail_path"),
        created_at: r.get("created_at"),
    }
}

fn maintenance_from_row(r: &PgRow) -> MaintenanceRecord {
    MaintenanceRecord {
        id: r.get("id"),
        item_id: r.get("item_id"),
        owner_id: r.get("owner_id"),
        date: r.get("date"),
        cost: r.get("cost"),
        currency_id: r.get("currency_id"),
        description: r.get("description"),
        next_service_date: r.get("next_service_date"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn upsert(&self, owner: Uuid, item: ItemUpsert) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let outcome = self.upsert_tx(&mut tx, owner, &item).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(outcome)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(item_from_row))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<()> {
        // item_label, attachment and maintenance_record cascade
        let deleted = sqlx::query("DELETE FROM item WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        if deleted == 0 {
            return Err(Error::NotFound(format!("item {}", id)));
        }
        Ok(())
    }

    async fn list_graphs(&self, owner: Uuid, filter: &ItemFilter) -> Result<Vec<ItemGraph>> {
        let items = self.fetch_items(owner, filter).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();

        // One query per relation instead of one per item.
        let label_rows = sqlx::query(
            r#"
            SELECT il.item_id, l.id, l.owner_id, l.name, l.color, l.description,
                   l.created_at, l.updated_at
            FROM item_label il
            JOIN label l ON l.id = il.label_id
            WHERE il.item_id = ANY($1)
            ORDER BY l.name
            "#,
        )
        .bind(&item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let location_rows = sqlx::query(
            "SELECT id, owner_id, name, description, created_at, updated_at
             FROM location
             WHERE id IN (SELECT location_id FROM item WHERE id = ANY($1))",
        )
        .bind(&item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let currency_rows = sqlx::query(
            "SELECT id, owner_id, name, code, symbol, created_at, updated_at
             FROM currency WHERE owner_id = $1",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let attachment_rows = sqlx::query(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachment
             WHERE item_id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(&item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let maintenance_rows = sqlx::query(&format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_record
             WHERE item_id = ANY($1) ORDER BY date DESC, id"
        ))
        .bind(&item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut labels: HashMap<Uuid, Vec<Label>> = HashMap::new();
        for r in &label_rows {
            labels.entry(r.get("item_id")).or_default().push(Label {
                id: r.get("id"),
                owner_id: r.get("owner_id"),
                name: r.get("name"),
                color: r.get("color"),
                description: r.get("description"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            });
        }

        let locations: HashMap<Uuid, Location> = location_rows
            .iter()
            .map(|r| {
                let location = Location {
                    id: r.get("id"),
                    owner_id: r.get("owner_id"),
                    name: r.get("name"),
                    description: r.get("description"),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                };
                (location.id, location)
            })
            .collect();

        let currencies: HashMap<Uuid, Currency> = currency_rows
            .iter()
            .map(|r| {
                let currency = currency_from_row(r);
                (currency.id, currency)
            })
            .collect();
        let currency = |id: Option<Uuid>| id.and_then(|id| currencies.get(&id).cloned());

        let mut attachments: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
        for r in &attachment_rows {
            let attachment = attachment_from_row(r);
            attachments
                .entry(attachment.item_id)
                .or_default()
                .push(attachment);
        }

        let mut maintenance: HashMap<Uuid, Vec<MaintenanceEntry>> = HashMap::new();
        for r in &maintenance_rows {
            let record = maintenance_from_row(r);
            let entry = MaintenanceEntry {
                currency: currency(record.currency_id),
                record,
            };
            maintenance
                .entry(entry.record.item_id)
                .or_default()
                .push(entry);
        }

        Ok(items
            .into_iter()
            .map(|item| ItemGraph {
                location: item.location_id.and_then(|id| locations.get(&id).cloned()),
                labels: labels.remove(&item.id).unwrap_or_default(),
                purchase_currency: currency(item.purchase_currency_id),
                sold_currency: currency(item.sold_currency_id),
                insured_currency: currency(item.insured_currency_id),
                attachments: attachments.remove(&item.id).unwrap_or_default(),
                maintenance_records: maintenance.remove(&item.id).unwrap_or_default(),
                item,
            })
            .collect())
    }

    async fn add_attachment(&self, owner: Uuid, attachment: NewAttachment) -> Result<Attachment> {
        if !self.item_exists(owner, attachment.item_id).await? {
            return Err(Error::NotFound(format!("item {}", attachment.item_id)));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO attachment (
                id, item_id, owner_id, name, content_type, size, is_primary,
                file_path, thumbnail_path, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ATTACHMENT_COLUMNS}
            "#
        ))
        .bind(new_v7())
        .bind(attachment.item_id)
        .bind(owner)
        .bind(&attachment.name)
        .bind(&attachment.content_type)
        .bind(attachment.size)
        .bind(attachment.is_primary)
        .bind(&attachment.file_path)
        .bind(&attachment.thumbnail_path)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(attachment_from_row(&row))
    }

    async fn add_maintenance_record(
        &self,
        owner: Uuid,
        record: NewMaintenanceRecord,
    ) -> Result<MaintenanceRecord> {
        if !self.item_exists(owner, record.item_id).await? {
            return Err(Error::NotFound(format!("item {}", record.item_id)));
        }
        if let Some(currency_id) = record.currency_id {
            let owned = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM currency WHERE id = $1 AND owner_id = $2)",
            )
            .bind(currency_id)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
            if !owned {
                return Err(Error::NotFound(format!("currency {}", currency_id)));
            }
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO maintenance_record (
                id, item_id, owner_id, date, cost, currency_id, description,
                next_service_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {MAINTENANCE_COLUMNS}
            "#
        ))
        .bind(new_v7())
        .bind(record.item_id)
        .bind(owner)
        .bind(record.date)
        .bind(&record.cost)
        .bind(record.currency_id)
        .bind(&record.description)
        .bind(record.next_service_date)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(maintenance_from_row(&row))
    }
}
