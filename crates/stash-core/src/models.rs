//! Core data models for stash.
//!
//! These types are shared across all stash crates and represent the
//! inventory entities, the normalized import records, and the eager item
//! graphs consumed by the exporter.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults::{DEFAULT_LABEL_COLOR, NAME_MAX_LEN};
use crate::error::{Error, Result};

// =============================================================================
// OWNERSHIP
// =============================================================================

/// Capability shared by every entity scoped to a single user.
///
/// Authorization checks query this uniformly instead of inspecting each
/// entity type's fields.
pub trait OwnedBy {
    /// The user that owns this entity.
    fn owner_id(&self) -> Uuid;

    /// True when `user` owns this entity.
    fn is_owned_by(&self, user: Uuid) -> bool {
        self.owner_id() == user
    }
}

macro_rules! impl_owned_by {
    ($($ty:ty),* $(,)?) => {
        $(
            impl OwnedBy for $ty {
                fn owner_id(&self) -> Uuid {
                    self.owner_id
                }
            }
        )*
    };
}

// =============================================================================
// REFERENCE ENTITIES
// =============================================================================

/// A place items are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A colored tag attached to any number of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// `#rrggbb`
    pub color: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A currency monetary values can be tied to. Code is stored upper-case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub code: String,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity kinds resolvable by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Location,
    Label,
    Currency,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Location => write!(f, "location"),
            Self::Label => write!(f, "label"),
            Self::Currency => write!(f, "currency"),
        }
    }
}

impl std::str::FromStr for ReferenceKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "location" | "locations" => Ok(Self::Location),
            "label" | "labels" => Ok(Self::Label),
            "currency" | "currencies" => Ok(Self::Currency),
            _ => Err(format!("Invalid reference kind: {}", s)),
        }
    }
}

/// An unresolved reference: natural key plus the defaults used on creation.
///
/// Defaults are ignored when an entity with the same natural key already
/// exists for the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReferenceDescriptor {
    Location {
        name: String,
        description: Option<String>,
    },
    Label {
        name: String,
        color: String,
    },
    Currency {
        code: String,
        name: String,
        symbol: String,
    },
}

impl ReferenceDescriptor {
    /// Location descriptor with no description.
    pub fn location(name: impl Into<String>) -> Self {
        Self::Location {
            name: name.into(),
            description: None,
        }
    }

    /// Label descriptor; `None` selects the default color.
    pub fn label(name: impl Into<String>, color: Option<String>) -> Self {
        Self::Label {
            name: name.into(),
            color: color.unwrap_or_else(|| DEFAULT_LABEL_COLOR.to_string()),
        }
    }

    /// Currency descriptor. The code is upper-cased; a missing name falls
    /// back to the code and a missing symbol to the empty string.
    pub fn currency(code: &str, name: Option<String>, symbol: Option<String>) -> Self {
        let code = code.trim().to_uppercase();
        Self::Currency {
            name: name.unwrap_or_else(|| code.clone()),
            symbol: symbol.unwrap_or_default(),
            code,
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            Self::Location { .. } => ReferenceKind::Location,
            Self::Label { .. } => ReferenceKind::Label,
            Self::Currency { .. } => ReferenceKind::Currency,
        }
    }

    /// Name for locations and labels, code for currencies.
    pub fn natural_key(&self) -> &str {
        match self {
            Self::Location { name, .. } | Self::Label { name, .. } => name,
            Self::Currency { code, .. } => code,
        }
    }
}

/// Outcome of a get-or-create lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedReference {
    pub id: Uuid,
    /// True when this call inserted the row.
    pub created: bool,
}

// =============================================================================
// ITEM TYPES
// =============================================================================

/// A cataloged physical item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub important: bool,
    pub purchase_price: Option<BigDecimal>,
    pub purchase_currency_id: Option<Uuid>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_from: Option<String>,
    pub manufacturer: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
    pub warranty_expires: Option<NaiveDate>,
    pub warranty_info: Option<String>,
    pub sold: bool,
    pub sold_date: Option<NaiveDate>,
    pub sold_price: Option<BigDecimal>,
    pub sold_currency_id: Option<Uuid>,
    pub sold_to: Option<String>,
    pub insured: bool,
    pub insured_value: Option<BigDecimal>,
    pub insured_currency_id: Option<Uuid>,
    pub insurance_details: Option<String>,
    pub location_id: Option<Uuid>,
    pub custom_fields: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// File metadata attached to an item. Storage itself is external.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub item_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub is_primary: bool,
    /// Path relative to the media root.
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One service or repair event for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: Uuid,
    pub item_id: Uuid,
    pub owner_id: Uuid,
    pub date: NaiveDate,
    pub cost: Option<BigDecimal>,
    pub currency_id: Option<Uuid>,
    pub description: String,
    pub next_service_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to attach file metadata to an item.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub item_id: Uuid,
    pub name: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub is_primary: bool,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
}

/// Request to record maintenance on an item.
#[derive(Debug, Clone)]
pub struct NewMaintenanceRecord {
    pub item_id: Uuid,
    pub date: NaiveDate,
    pub cost: Option<BigDecimal>,
    pub currency_id: Option<Uuid>,
    pub description: String,
    pub next_service_date: Option<NaiveDate>,
}

/// Maintenance record with its currency loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceEntry {
    pub record: MaintenanceRecord,
    pub currency: Option<Currency>,
}

/// An item with every relationship eagerly loaded, ready for export.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemGraph {
    pub item: Item,
    pub location: Option<Location>,
    /// Sorted by name.
    pub labels: Vec<Label>,
    pub purchase_currency: Option<Currency>,
    pub sold_currency: Option<Currency>,
    pub insured_currency: Option<Currency>,
    pub attachments: Vec<Attachment>,
    pub maintenance_records: Vec<MaintenanceEntry>,
}

impl_owned_by!(Location, Label, Currency, Item, Attachment, MaintenanceRecord, ImportLog);

impl OwnedBy for ItemGraph {
    fn owner_id(&self) -> Uuid {
        self.item.owner_id
    }
}

// =============================================================================
// NORMALIZED IMPORT RECORDS
// =============================================================================

/// Canonical item field set produced by the normalizer.
///
/// Every text field is trimmed with blanks collapsed to `None`; decimals
/// carry two places. `custom_fields` is `None` when the record did not
/// supply it, which leaves an existing item's value untouched on update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFields {
    /// Client-supplied identity, used for update-by-id.
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: i32,
    pub important: bool,
    pub purchase_price: Option<BigDecimal>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_from: Option<String>,
    pub manufacturer: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
    pub warranty_expires: Option<NaiveDate>,
    pub warranty_info: Option<String>,
    pub sold: bool,
    pub sold_date: Option<NaiveDate>,
    pub sold_price: Option<BigDecimal>,
    pub sold_to: Option<String>,
    pub insured: bool,
    pub insured_value: Option<BigDecimal>,
    pub insurance_details: Option<String>,
    pub custom_fields: Option<JsonValue>,
}

impl ItemFields {
    /// Validate the fields an item cannot exist without, returning the name.
    pub fn validated_name(&self) -> Result<&str> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("Item name is required".to_string()))?;
        let len = name.chars().count();
        if len > NAME_MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "Item name exceeds {} characters ({})",
                NAME_MAX_LEN, len
            )));
        }
        Ok(name)
    }
}

/// Reference descriptors extracted from one record, not yet resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemReferences {
    pub location: Option<ReferenceDescriptor>,
    pub labels: Vec<ReferenceDescriptor>,
    pub purchase_currency: Option<ReferenceDescriptor>,
    pub sold_currency: Option<ReferenceDescriptor>,
    pub insured_currency: Option<ReferenceDescriptor>,
}

/// Reference ids after resolution, scoped to the importing owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedReferences {
    pub location_id: Option<Uuid>,
    /// Deduplicated, order irrelevant.
    pub label_ids: Vec<Uuid>,
    pub purchase_currency_id: Option<Uuid>,
    pub sold_currency_id: Option<Uuid>,
    pub insured_currency_id: Option<Uuid>,
}

/// A fully resolved item write handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpsert {
    pub fields: ItemFields,
    pub references: ResolvedReferences,
}

/// Whether an upsert inserted a new item or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Uuid),
    Updated(Uuid),
}

impl UpsertOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Created(id) | Self::Updated(id) => *id,
        }
    }
}

// =============================================================================
// IMPORT LOG TYPES
// =============================================================================

/// Serialization formats supported by import and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Json,
}

impl DataFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
        }
    }

    pub fn import_kind(&self) -> OperationKind {
        match self {
            Self::Csv => OperationKind::CsvImport,
            Self::Json => OperationKind::JsonImport,
        }
    }

    pub fn export_kind(&self) -> OperationKind {
        match self {
            Self::Csv => OperationKind::CsvExport,
            Self::Json => OperationKind::JsonExport,
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Kind of operation an ImportLog records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "CSV Import")]
    CsvImport,
    #[serde(rename = "CSV Export")]
    CsvExport,
    #[serde(rename = "JSON Import")]
    JsonImport,
    #[serde(rename = "JSON Export")]
    JsonExport,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CsvImport => "CSV Import",
            Self::CsvExport => "CSV Export",
            Self::JsonImport => "JSON Import",
            Self::JsonExport => "JSON Export",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CSV Import" => Ok(Self::CsvImport),
            "CSV Export" => Ok(Self::CsvExport),
            "JSON Import" => Ok(Self::JsonImport),
            "JSON Export" => Ok(Self::JsonExport),
            _ => Err(format!("Invalid operation kind: {}", s)),
        }
    }
}

/// Lifecycle status of an import or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "Partial Success")]
    PartialSuccess,
    #[serde(rename = "Failed")]
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "In Progress",
            Self::Success => "Success",
            Self::PartialSuccess => "Partial Success",
            Self::Failed => "Failed",
        }
    }

    /// Final status for a finished batch.
    pub fn from_counts(succeeded: u32, failed: u32) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failed,
            _ => Self::PartialSuccess,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "In Progress" => Ok(Self::InProgress),
            "Success" => Ok(Self::Success),
            "Partial Success" => Ok(Self::PartialSuccess),
            "Failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid import status: {}", s)),
        }
    }
}

/// Persistent record of one import or export operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLog {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub import_type: OperationKind,
    pub status: ImportStatus,
    pub items_created: i32,
    pub items_updated: i32,
    pub items_failed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields supplied when an operation starts.
#[derive(Debug, Clone)]
pub struct NewImportLog {
    pub file_name: String,
    pub file_size: i64,
    pub import_type: OperationKind,
}

/// Final counters written once when an operation completes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportLogCompletion {
    pub status: ImportStatus,
    pub items_created: i32,
    pub items_updated: i32,
    pub items_failed: i32,
    pub error_message: Option<String>,
}

impl ImportLogCompletion {
    /// Completion for an operation that aborted before processing records.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ImportStatus::Failed,
            items_created: 0,
            items_updated: 0,
            items_failed: 0,
            error_message: Some(message.into()),
        }
    }

    /// Completion for a successful export.
    pub fn export_success() -> Self {
        Self {
            status: ImportStatus::Success,
            items_created: 0,
            items_updated: 0,
            items_failed: 0,
            error_message: None,
        }
    }
}
