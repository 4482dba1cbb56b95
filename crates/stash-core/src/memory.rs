//! In-memory entity store.
//!
//! Implements every repository trait behind a single async lock, which makes
//! each call atomic and gives resolution the same at-most-one-row guarantee
//! the database gets from its unique indexes. Used by tests and by embedders
//! that do not need persistence.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use stash_core::memory::MemoryStore;
//! use stash_core::{ImportService, ReferenceResolver};
//!
//! let store = Arc::new(MemoryStore::new());
//! let service = ImportService::new(
//!     store.clone(),
//!     ReferenceResolver::new(store.clone()),
//!     store.clone(),
//! );
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::{
    ImportLogOrdering, ImportLogRepository, ItemFilter, ItemRepository, ListImportLogsRequest,
    ReferenceRepository,
};
use crate::uuid_utils::new_v7;

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<Uuid, Item>,
    item_labels: BTreeMap<Uuid, BTreeSet<Uuid>>,
    locations: BTreeMap<Uuid, Location>,
    labels: BTreeMap<Uuid, Label>,
    currencies: BTreeMap<Uuid, Currency>,
    attachments: BTreeMap<Uuid, Attachment>,
    maintenance: BTreeMap<Uuid, MaintenanceRecord>,
    logs: BTreeMap<Uuid, ImportLog>,
}

/// Entity store held entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items across all owners.
    pub async fn item_count(&self) -> usize {
        self.state.lock().await.items.len()
    }
}

impl State {
    fn owned_item(&self, owner: Uuid, id: Uuid) -> Option<&Item> {
        self.items.get(&id).filter(|i| i.is_owned_by(owner))
    }

    fn owned_currency(&self, owner: Uuid, id: Uuid) -> Option<&Currency> {
        self.currencies.get(&id).filter(|c| c.is_owned_by(owner))
    }

    fn check_references(&self, owner: Uuid, refs: &ResolvedReferences) -> Result<()> {
        if let Some(id) = refs.location_id {
            if !self.locations.get(&id).is_some_and(|l| l.is_owned_by(owner)) {
                return Err(Error::NotFound(format!("location {}", id)));
            }
        }
        for id in &refs.label_ids {
            if !self.labels.get(id).is_some_and(|l| l.is_owned_by(owner)) {
                return Err(Error::NotFound(format!("label {}", id)));
            }
        }
        for id in [
            refs.purchase_currency_id,
            refs.sold_currency_id,
            refs.insured_currency_id,
        ]
        .into_iter()
        .flatten()
        {
            if self.owned_currency(owner, id).is_none() {
                return Err(Error::NotFound(format!("currency {}", id)));
            }
        }
        Ok(())
    }

    fn graph(&self, item: &Item) -> ItemGraph {
        let currency = |id: Option<Uuid>| id.and_then(|id| self.currencies.get(&id).cloned());
        let mut labels: Vec<Label> = self
            .item_labels
            .get(&item.id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.labels.get(id).cloned())
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        let attachments = self
            .attachments
            .values()
            .filter(|a| a.item_id == item.id)
            .cloned()
            .collect();
        let mut maintenance_records: Vec<MaintenanceEntry> = self
            .maintenance
            .values()
            .filter(|m| m.item_id == item.id)
            .map(|m| MaintenanceEntry {
                record: m.clone(),
                currency: currency(m.currency_id),
            })
            .collect();
        maintenance_records.sort_by(|a, b| b.record.date.cmp(&a.record.date));
        ItemGraph {
            item: item.clone(),
            location: item.location_id.and_then(|id| self.locations.get(&id).cloned()),
            labels,
            purchase_currency: currency(item.purchase_currency_id),
            sold_currency: currency(item.sold_currency_id),
            insured_currency: currency(item.insured_currency_id),
            attachments,
            maintenance_records,
        }
    }
}

struct Stamp {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    custom_fields: serde_json::Value,
}

fn build_item(owner: Uuid, name: String, upsert: ItemUpsert, stamp: Stamp) -> Item {
    let ItemUpsert { fields, references } = upsert;
    Item {
        id: stamp.id,
        owner_id: owner,
        name,
        description: fields.description,
        quantity: fields.quantity,
        important: fields.important,
        purchase_price: fields.purchase_price,
        purchase_currency_id: references.purchase_currency_id,
        purchase_date: fields.purchase_date,
        purchase_from: fields.purchase_from,
        manufacturer: fields.manufacturer,
        model_number: fields.model_number,
        serial_number: fields.serial_number,
        notes: fields.notes,
        warranty_expires: fields.warranty_expires,
        warranty_info: fields.warranty_info,
        sold: fields.sold,
        sold_date: fields.sold_date,
        sold_price: fields.sold_price,
        sold_currency_id: references.sold_currency_id,
        sold_to: fields.sold_to,
        insured: fields.insured,
        insured_value: fields.insured_value,
        insured_currency_id: references.insured_currency_id,
        insurance_details: fields.insurance_details,
        location_id: references.location_id,
        custom_fields: stamp.custom_fields,
        created_at: stamp.created_at,
        updated_at: stamp.updated_at,
    }
}

#[async_trait]
impl ItemRepository for MemoryStore {
    async fn upsert(&self, owner: Uuid, item: ItemUpsert) -> Result<UpsertOutcome> {
        let name = item.fields.validated_name()?.to_string();

        let mut state = self.state.lock().await;
        state.check_references(owner, &item.references)?;

        let now = Utc::now();
        let existing = item
            .fields
            .id
            .and_then(|id| state.owned_item(owner, id))
            .map(|prev| (prev.id, prev.created_at, prev.updated_at, prev.custom_fields.clone()));
        let label_ids: BTreeSet<Uuid> = item.references.label_ids.iter().copied().collect();

        let (outcome, stamp) = match existing {
            Some((id, created_at, prev_updated, prev_custom)) => (
                UpsertOutcome::Updated(id),
                Stamp {
                    id,
                    created_at,
                    updated_at: now.max(prev_updated),
                    custom_fields: item.fields.custom_fields.clone().unwrap_or(prev_custom),
                },
            ),
            None => {
                let id = new_v7();
                (
                    UpsertOutcome::Created(id),
                    Stamp {
                        id,
                        created_at: now,
                        updated_at: now,
                        custom_fields: item.fields.custom_fields.clone().unwrap_or_else(|| json!({})),
                    },
                )
            }
        };

        let id = stamp.id;
        let record = build_item(owner, name, item, stamp);
        state.items.insert(id, record);
        state.item_labels.insert(id, label_ids);
        Ok(outcome)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<Item>> {
        Ok(self.state.lock().await.owned_item(owner, id).cloned())
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.owned_item(owner, id).is_none() {
            return Err(Error::NotFound(format!("item {}", id)));
        }
        state.items.remove(&id);
        state.item_labels.remove(&id);
        state.attachments.retain(|_, a| a.item_id != id);
        state.maintenance.retain(|_, m| m.item_id != id);
        Ok(())
    }

    async fn list_graphs(&self, owner: Uuid, filter: &ItemFilter) -> Result<Vec<ItemGraph>> {
        let state = self.state.lock().await;
        let empty = BTreeSet::new();
        Ok(state
            .items
            .values()
            .filter(|item| item.is_owned_by(owner))
            .filter(|item| {
                let labels: Vec<Uuid> = state
                    .item_labels
                    .get(&item.id)
                    .unwrap_or(&empty)
                    .iter()
                    .copied()
                    .collect();
                filter.matches(item, &labels)
            })
            .map(|item| state.graph(item))
            .collect())
    }

    async fn add_attachment(&self, owner: Uuid, attachment: NewAttachment) -> Result<Attachment> {
        let mut state = self.state.lock().await;
        if state.owned_item(owner, attachment.item_id).is_none() {
            return Err(Error::NotFound(format!("item {}", attachment.item_id)));
        }
        let record = Attachment {
            id: new_v7(),
            item_id: attachment.item_id,
            owner_id: owner,
            name: attachment.name,
            content_type: attachment.content_type,
            size: attachment.size,
            is_primary: attachment.is_primary,
            file_path: attachment.file_path,
            thumbnail_path: attachment.thumbnail_path,
            created_at: Utc::now(),
        };
        state.attachments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn add_maintenance_record(
        &self,
        owner: Uuid,
        record: NewMaintenanceRecord,
    ) -> Result<MaintenanceRecord> {
        let mut state = self.state.lock().await;
        if state.owned_item(owner, record.item_id).is_none() {
            return Err(Error::NotFound(format!("item {}", record.item_id)));
        }
        if let Some(currency_id) = record.currency_id {
            if state.owned_currency(owner, currency_id).is_none() {
                return Err(Error::NotFound(format!("currency {}", currency_id)));
            }
        }
        let now = Utc::now();
        let stored = MaintenanceRecord {
            id: new_v7(),
            item_id: record.item_id,
            owner_id: owner,
            date: record.date,
            cost: record.cost,
            currency_id: record.currency_id,
            description: record.description,
            next_service_date: record.next_service_date,
            created_at: now,
            updated_at: now,
        };
        state.maintenance.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl ReferenceRepository for MemoryStore {
    async fn resolve_or_create(
        &self,
        owner: Uuid,
        descriptor: &ReferenceDescriptor,
    ) -> Result<ResolvedReference> {
        let mut state = self.state.lock().await;
        let key = descriptor.natural_key();
        let existing = match descriptor.kind() {
            ReferenceKind::Location => state
                .locations
                .values()
                .find(|l| l.is_owned_by(owner) && l.name == key)
                .map(|l| l.id),
            ReferenceKind::Label => state
                .labels
                .values()
                .find(|l| l.is_owned_by(owner) && l.name == key)
                .map(|l| l.id),
            ReferenceKind::Currency => state
                .currencies
                .values()
                .find(|c| c.is_owned_by(owner) && c.code == key)
                .map(|c| c.id),
        };
        if let Some(id) = existing {
            return Ok(ResolvedReference { id, created: false });
        }

        let id = new_v7();
        let now = Utc::now();
        match descriptor.clone() {
            ReferenceDescriptor::Location { name, description } => {
                state.locations.insert(
                    id,
                    Location {
                        id,
                        owner_id: owner,
                        name,
                        description,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            ReferenceDescriptor::Label { name, color } => {
                state.labels.insert(
                    id,
                    Label {
                        id,
                        owner_id: owner,
                        name,
                        color,
                        description: None,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            ReferenceDescriptor::Currency { code, name, symbol } => {
                state.currencies.insert(
                    id,
                    Currency {
                        id,
                        owner_id: owner,
                        name,
                        code,
                        symbol,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(ResolvedReference { id, created: true })
    }

    async fn delete(&self, owner: Uuid, kind: ReferenceKind, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        let not_found = || Error::NotFound(format!("{} {}", kind, id));
        match kind {
            ReferenceKind::Location => {
                if !state.locations.get(&id).is_some_and(|l| l.is_owned_by(owner)) {
                    return Err(not_found());
                }
                state.locations.remove(&id);
                for item in state.items.values_mut() {
                    if item.location_id == Some(id) {
                        item.location_id = None;
                    }
                }
            }
            ReferenceKind::Label => {
                if !state.labels.get(&id).is_some_and(|l| l.is_owned_by(owner)) {
                    return Err(not_found());
                }
                state.labels.remove(&id);
                for labels in state.item_labels.values_mut() {
                    labels.remove(&id);
                }
            }
            ReferenceKind::Currency => {
                if state.owned_currency(owner, id).is_none() {
                    return Err(not_found());
                }
                state.currencies.remove(&id);
                let clear = |slot: &mut Option<Uuid>| {
                    if *slot == Some(id) {
                        *slot = None;
                    }
                };
                for item in state.items.values_mut() {
                    clear(&mut item.purchase_currency_id);
                    clear(&mut item.sold_currency_id);
                    clear(&mut item.insured_currency_id);
                }
                for record in state.maintenance.values_mut() {
                    clear(&mut record.currency_id);
                }
            }
        }
        Ok(())
    }

    async fn list_locations(&self, owner: Uuid) -> Result<Vec<Location>> {
        let state = self.state.lock().await;
        let mut out: Vec<Location> = state
            .locations
            .values()
            .filter(|l| l.is_owned_by(owner))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn list_labels(&self, owner: Uuid) -> Result<Vec<Label>> {
        let state = self.state.lock().await;
        let mut out: Vec<Label> = state
            .labels
            .values()
            .filter(|l| l.is_owned_by(owner))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn list_currencies(&self, owner: Uuid) -> Result<Vec<Currency>> {
        let state = self.state.lock().await;
        let mut out: Vec<Currency> = state
            .currencies
            .values()
            .filter(|c| c.is_owned_by(owner))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(out)
    }
}

#[async_trait]
impl ImportLogRepository for MemoryStore {
    async fn start(&self, owner: Uuid, log: NewImportLog) -> Result<ImportLog> {
        let record = ImportLog {
            id: new_v7(),
            owner_id: owner,
            file_name: log.file_name,
            file_size: log.file_size,
            import_type: log.import_type,
            status: ImportStatus::InProgress,
            items_created: 0,
            items_updated: 0,
            items_failed: 0,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.state
            .lock()
            .await
            .logs
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn complete(
        &self,
        owner: Uuid,
        id: Uuid,
        completion: ImportLogCompletion,
    ) -> Result<ImportLog> {
        let mut state = self.state.lock().await;
        let log = state
            .logs
            .get_mut(&id)
            .filter(|l| l.is_owned_by(owner))
            .ok_or_else(|| Error::NotFound(format!("import log {}", id)))?;
        if log.completed_at.is_some() {
            return Err(Error::InvalidInput(format!(
                "Import log {} is already complete",
                id
            )));
        }
        log.status = completion.status;
        log.items_created = completion.items_created;
        log.items_updated = completion.items_updated;
        log.items_failed = completion.items_failed;
        log.error_message = completion.error_message;
        log.completed_at = Some(Utc::now());
        Ok(log.clone())
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<ImportLog>> {
        let state = self.state.lock().await;
        Ok(state.logs.get(&id).filter(|l| l.is_owned_by(owner)).cloned())
    }

    async fn list(&self, owner: Uuid, req: ListImportLogsRequest) -> Result<Vec<ImportLog>> {
        let req = req.clamped();
        let state = self.state.lock().await;
        let mut logs: Vec<ImportLog> = state
            .logs
            .values()
            .filter(|l| l.is_owned_by(owner))
            .cloned()
            .collect();
        sort_logs(&mut logs, req.ordering);
        Ok(logs
            .into_iter()
            .skip(req.offset as usize)
            .take(req.limit as usize)
            .collect())
    }
}

fn sort_logs(logs: &mut [ImportLog], ordering: ImportLogOrdering) {
    use std::cmp::Ordering;

    // None sorts after every timestamp in both directions.
    fn nulls_last(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, desc: bool) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) if desc => b.cmp(&a),
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    logs.sort_by(|a, b| match ordering {
        ImportLogOrdering::CreatedAtAsc => (a.created_at, a.id).cmp(&(b.created_at, b.id)),
        ImportLogOrdering::CreatedAtDesc => (b.created_at, b.id).cmp(&(a.created_at, a.id)),
        ImportLogOrdering::CompletedAtAsc => {
            nulls_last(a.completed_at, b.completed_at, false).then(a.id.cmp(&b.id))
        }
        ImportLogOrdering::CompletedAtDesc => {
            nulls_last(a.completed_at, b.completed_at, true).then(b.id.cmp(&a.id))
        }
        ImportLogOrdering::StatusAsc => a
            .status
            .as_str()
            .cmp(b.status.as_str())
            .then(b.created_at.cmp(&a.created_at)),
        ImportLogOrdering::StatusDesc => b
            .status
            .as_str()
            .cmp(a.status.as_str())
            .then(b.created_at.cmp(&a.created_at)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn upsert(name: &str, id: Option<Uuid>) -> ItemUpsert {
        ItemUpsert {
            fields: ItemFields {
                id,
                name: Some(name.to_string()),
                quantity: 1,
                ..Default::default()
            },
            references: ResolvedReferences::default(),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = MemoryStore::new();
        let owner = new_v7();
        let created = store.upsert(owner, upsert("Drill", None)).await.unwrap();
        let UpsertOutcome::Created(id) = created else {
            panic!("expected create");
        };

        let updated = store.upsert(owner, upsert("Drill v2", Some(id))).await.unwrap();
        assert_eq!(updated, UpsertOutcome::Updated(id));
        let item = ItemRepository::get(&store, owner, id).await.unwrap().unwrap();
        assert_eq!(item.name, "Drill v2");
        assert!(item.updated_at >= item.created_at);
        assert_eq!(store.item_count().await, 1);
    }

    #[tokio::test]
    async fn test_foreign_id_creates_new_item() {
        let store = MemoryStore::new();
        let alice = new_v7();
        let bob = new_v7();
        let id = store.upsert(alice, upsert("Lamp", None)).await.unwrap().id();

        let outcome = store.upsert(bob, upsert("Lamp", Some(id))).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Created(new_id) if new_id != id));
        let alices = ItemRepository::get(&store, alice, id).await.unwrap().unwrap();
        assert_eq!(alices.owner_id, alice);
    }

    #[tokio::test]
    async fn test_custom_fields_kept_when_absent_on_update() {
        let store = MemoryStore::new();
        let owner = new_v7();
        let mut first = upsert("Camera", None);
        first.fields.custom_fields = Some(json!({"lens": "35mm"}));
        let id = store.upsert(owner, first).await.unwrap().id();

        store.upsert(owner, upsert("Camera", Some(id))).await.unwrap();
        let item = ItemRepository::get(&store, owner, id).await.unwrap().unwrap();
        assert_eq!(item.custom_fields, json!({"lens": "35mm"}));
    }

    #[tokio::test]
    async fn test_cross_owner_reference_rejected() {
        let store = MemoryStore::new();
        let other = new_v7();
        let loc = store
            .resolve_or_create(other, &ReferenceDescriptor::location("Attic"))
            .await
            .unwrap();
        let mut item = upsert("Box", None);
        item.references.location_id = Some(loc.id);
        let err = store.upsert(new_v7(), item).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.item_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_owned_records() {
        let store = MemoryStore::new();
        let owner = new_v7();
        let id = store.upsert(owner, upsert("Bike", None)).await.unwrap().id();
        store
            .add_maintenance_record(
                owner,
                NewMaintenanceRecord {
                    item_id: id,
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    cost: None,
                    currency_id: None,
                    description: "Chain".into(),
                    next_service_date: None,
                },
            )
            .await
            .unwrap();
        ItemRepository::delete(&store, owner, id).await.unwrap();
        assert!(store.state.lock().await.maintenance.is_empty());
        assert!(ItemRepository::delete(&store, owner, id).await.is_err());
    }

    #[tokio::test]
    async fn test_completed_log_is_immutable() {
        let store = MemoryStore::new();
        let owner = new_v7();
        let log = store
            .start(
                owner,
                NewImportLog {
                    file_name: "items.csv".into(),
                    file_size: 10,
                    import_type: OperationKind::CsvImport,
                },
            )
            .await
            .unwrap();
        assert_eq!(log.status, ImportStatus::InProgress);

        store
            .complete(owner, log.id, ImportLogCompletion::export_success())
            .await
            .unwrap();
        let again = store
            .complete(owner, log.id, ImportLogCompletion::failed("late"))
            .await;
        assert!(matches!(again, Err(Error::InvalidInput(_))));

        let stored = ImportLogRepository::get(&store, owner, log.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ImportStatus::Success);
        assert!(ImportLogRepository::get(&store, new_v7(), log.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_listing_newest_first() {
        let store = MemoryStore::new();
        let owner = new_v7();
        let mut ids = Vec::new();
        for name in ["a.csv", "b.csv", "c.csv"] {
            let log = store
                .start(
                    owner,
                    NewImportLog {
                        file_name: name.into(),
                        file_size: 1,
                        import_type: OperationKind::CsvImport,
                    },
                )
                .await
                .unwrap();
            ids.push(log.id);
        }
        let listed = store.list(owner, ListImportLogsRequest::default()).await.unwrap();
        let listed_ids: Vec<Uuid> = listed.iter().map(|l| l.id).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids);

        let page = store
            .list(
                owner,
                ListImportLogsRequest {
                    ordering: ImportLogOrdering::CreatedAtAsc,
                    limit: 1,
                    offset: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[1]);
    }
}
