//! Repository traits for the entity store.
//!
//! Implemented for PostgreSQL in `stash-db` and in memory by
//! [`crate::memory::MemoryStore`]. Every method is scoped to an owner;
//! entities belonging to other users behave as if they did not exist.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX, PAGE_OFFSET};
use crate::error::Result;
use crate::models::*;

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Narrows the items an export covers. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemFilter {
    /// Only items stored at this location.
    pub location: Option<Uuid>,
    /// Only items carrying this label.
    pub label: Option<Uuid>,
    pub important: Option<bool>,
    pub insured: Option<bool>,
    pub sold: Option<bool>,
    /// Case-insensitive substring over name, description, serial number,
    /// model number, manufacturer and notes.
    pub q: Option<String>,
}

impl ItemFilter {
    /// Search term with surrounding whitespace removed; blank means none.
    pub fn search_term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Evaluate the filter against an item and its label ids.
    pub fn matches(&self, item: &Item, label_ids: &[Uuid]) -> bool {
        if self.location.is_some() && item.location_id != self.location {
            return false;
        }
        if let Some(label) = self.label {
            if !label_ids.contains(&label) {
                return false;
            }
        }
        if self.important.is_some_and(|v| v != item.important)
            || self.insured.is_some_and(|v| v != item.insured)
            || self.sold.is_some_and(|v| v != item.sold)
        {
            return false;
        }
        match self.search_term() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                std::iter::once(Some(item.name.as_str()))
                    .chain([
                        item.description.as_deref(),
                        item.serial_number.as_deref(),
                        item.model_number.as_deref(),
                        item.manufacturer.as_deref(),
                        item.notes.as_deref(),
                    ])
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&term))
            }
        }
    }
}

/// Sort order for import log listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportLogOrdering {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
    CompletedAtAsc,
    CompletedAtDesc,
    StatusAsc,
    StatusDesc,
}

impl ImportLogOrdering {
    /// SQL ORDER BY clause. Ties break on id, which is time-ordered.
    pub fn order_by_sql(&self) -> &'static str {
        match self {
            Self::CreatedAtAsc => "created_at ASC, id ASC",
            Self::CreatedAtDesc => "created_at DESC, id DESC",
            Self::CompletedAtAsc => "completed_at ASC NULLS LAST, id ASC",
            Self::CompletedAtDesc => "completed_at DESC NULLS LAST, id DESC",
            Self::StatusAsc => "status ASC, created_at DESC",
            Self::StatusDesc => "status DESC, created_at DESC",
        }
    }
}

impl std::str::FromStr for ImportLogOrdering {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "created_at" => Ok(Self::CreatedAtAsc),
            "-created_at" => Ok(Self::CreatedAtDesc),
            "completed_at" => Ok(Self::CompletedAtAsc),
            "-completed_at" => Ok(Self::CompletedAtDesc),
            "status" => Ok(Self::StatusAsc),
            "-status" => Ok(Self::StatusDesc),
            other => Err(format!("Invalid ordering: {}", other)),
        }
    }
}

/// Request for listing import logs.
#[derive(Debug, Clone, Copy)]
pub struct ListImportLogsRequest {
    pub ordering: ImportLogOrdering,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListImportLogsRequest {
    fn default() -> Self {
        Self {
            ordering: ImportLogOrdering::default(),
            limit: PAGE_LIMIT,
            offset: PAGE_OFFSET,
        }
    }
}

impl ListImportLogsRequest {
    /// Clamp limit and offset into accepted ranges.
    pub fn clamped(self) -> Self {
        Self {
            ordering: self.ordering,
            limit: self.limit.clamp(1, PAGE_LIMIT_MAX),
            offset: self.offset.max(0),
        }
    }
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for items and the records they own.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Create or update one item atomically.
    ///
    /// Updates when `fields.id` names an item owned by `owner`; otherwise
    /// creates with a fresh id. The identity lookup, the scalar write, the
    /// reference columns and the label set replacement commit together.
    async fn upsert(&self, owner: Uuid, item: ItemUpsert) -> Result<UpsertOutcome>;

    /// Fetch an item by id.
    async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<Item>>;

    /// Delete an item together with its attachments and maintenance records.
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<()>;

    /// Load complete item graphs, oldest first, narrowed by `filter`.
    async fn list_graphs(&self, owner: Uuid, filter: &ItemFilter) -> Result<Vec<ItemGraph>>;

    /// Record attachment metadata for an item.
    async fn add_attachment(&self, owner: Uuid, attachment: NewAttachment) -> Result<Attachment>;

    /// Record maintenance performed on an item.
    async fn add_maintenance_record(
        &self,
        owner: Uuid,
        record: NewMaintenanceRecord,
    ) -> Result<MaintenanceRecord>;
}

/// Repository for locations, labels and currencies.
#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    /// Return the entity matching the descriptor's natural key, creating it
    /// from the descriptor's defaults if absent.
    ///
    /// Concurrent calls with the same key never produce duplicates.
    async fn resolve_or_create(
        &self,
        owner: Uuid,
        descriptor: &ReferenceDescriptor,
    ) -> Result<ResolvedReference>;

    /// Delete a reference entity, clearing every reference to it.
    async fn delete(&self, owner: Uuid, kind: ReferenceKind, id: Uuid) -> Result<()>;

    async fn list_locations(&self, owner: Uuid) -> Result<Vec<Location>>;

    async fn list_labels(&self, owner: Uuid) -> Result<Vec<Label>>;

    async fn list_currencies(&self, owner: Uuid) -> Result<Vec<Currency>>;
}

/// Repository for import/export audit records.
#[async_trait]
pub trait ImportLogRepository: Send + Sync {
    /// Create a log in `In Progress` state.
    async fn start(&self, owner: Uuid, log: NewImportLog) -> Result<ImportLog>;

    /// Write final counters and status.
    ///
    /// Fails with `InvalidInput` if the log is already complete and with
    /// `NotFound` if it does not exist for `owner`.
    async fn complete(
        &self,
        owner: Uuid,
        id: Uuid,
        completion: ImportLogCompletion,
    ) -> Result<ImportLog>;

    async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<ImportLog>>;

    async fn list(&self, owner: Uuid, req: ListImportLogsRequest) -> Result<Vec<ImportLog>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn item(name: &str) -> Item {
        let now = Utc::now();
        Item {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            name: name.into(),
            description: None,
            quantity: 1,
            important: false,
            purchase_price: None,
            purchase_currency_id: None,
            purchase_date: None,
            purchase_from: None,
            manufacturer: None,
            model_number: None,
            serial_number: None,
            notes: None,
            warranty_expires: None,
            warranty_info: None,
            sold: false,
            sold_date: None,
            sold_price: None,
            sold_currency_id: None,
            sold_to: None,
            insured: false,
            insured_value: None,
            insured_currency_id: None,
            insurance_details: None,
            location_id: None,
            custom_fields: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(ItemFilter::default().matches(&item("Drill"), &[]));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let mut it = item("Cordless Drill");
        it.serial_number = Some("SN-778".into());
        let by_name = ItemFilter {
            q: Some("drill".into()),
            ..Default::default()
        };
        let by_serial = ItemFilter {
            q: Some(" sn-77 ".into()),
            ..Default::default()
        };
        let miss = ItemFilter {
            q: Some("saw".into()),
            ..Default::default()
        };
        assert!(by_name.matches(&it, &[]));
        assert!(by_serial.matches(&it, &[]));
        assert!(!miss.matches(&it, &[]));
    }

    #[test]
    fn test_filter_flags_and_label() {
        let mut it = item("Camera");
        it.insured = true;
        let label = Uuid::now_v7();
        let filter = ItemFilter {
            insured: Some(true),
            label: Some(label),
            ..Default::default()
        };
        assert!(filter.matches(&it, &[label]));
        assert!(!filter.matches(&it, &[]));
        it.insured = false;
        assert!(!filter.matches(&it, &[label]));
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!("-created_at".parse(), Ok(ImportLogOrdering::CreatedAtDesc));
        assert_eq!("status".parse(), Ok(ImportLogOrdering::StatusAsc));
        assert!("name".parse::<ImportLogOrdering>().is_err());
        assert_eq!(ImportLogOrdering::default(), ImportLogOrdering::CreatedAtDesc);
    }

    #[test]
    fn test_list_request_clamped() {
        let req = ListImportLogsRequest {
            limit: 10_000,
            offset: -5,
            ..Default::default()
        }
        .clamped();
        assert_eq!(req.limit, PAGE_LIMIT_MAX);
        assert_eq!(req.offset, 0);
    }
}
