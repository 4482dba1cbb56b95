//! Item export.
//!
//! [`export_csv`] and [`export_json`] are pure renderers over eagerly
//! loaded [`ItemGraph`]s. [`ExportService`] loads the graphs, renders them
//! and records the operation in an ImportLog.
//!
//! CSV booleans are always written as `Yes`/`No`, which the importer reads
//! back as the same values.

use std::sync::Arc;
use std::time::Instant;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Number, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

use crate::defaults::{CSV_HEADERS, EXPORT_FILE_PREFIX, MEDIA_URL_PREFIX, MONEY_SCALE};
use crate::error::{Error, Result};
use crate::models::{
    Attachment, Currency, DataFormat, ImportLogCompletion, ItemGraph, Label, Location,
    MaintenanceEntry, NewImportLog,
};
use crate::traits::{ImportLogRepository, ItemFilter, ItemRepository};

// =============================================================================
// CSV
// =============================================================================

/// Render items as CSV with the fixed 27-column header.
pub fn export_csv(items: &[ItemGraph]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for graph in items {
        writer.write_record(csv_row(graph))?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Csv(format!("Failed to flush CSV writer: {}", e)))
}

fn csv_row(graph: &ItemGraph) -> [String; 27] {
    let item = &graph.item;
    [
        item.name.clone(),
        text(&item.description),
        item.quantity.to_string(),
        yes_no(item.important),
        money_text(&item.purchase_price),
        currency_code(&graph.purchase_currency),
        date_text(item.purchase_date),
        text(&item.purchase_from),
        text(&item.manufacturer),
        text(&item.model_number),
        text(&item.serial_number),
        text(&item.notes),
        date_text(item.warranty_expires),
        text(&item.warranty_info),
        yes_no(item.sold),
        date_text(item.sold_date),
        money_text(&item.sold_price),
        currency_code(&graph.sold_currency),
        text(&item.sold_to),
        yes_no(item.insured),
        money_text(&item.insured_value),
        currency_code(&graph.insured_currency),
        text(&item.insurance_details),
        graph
            .location
            .as_ref()
            .map(|l| l.name.clone())
            .unwrap_or_default(),
        graph
            .labels
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        timestamp(&item.created_at),
        timestamp(&item.updated_at),
    ]
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn yes_no(value: bool) -> String {
    let literal = if value { "Yes" } else { "No" };
    literal.to_string()
}

fn money_text(value: &Option<BigDecimal>) -> String {
    value
        .as_ref()
        .map(|d| d.with_scale(MONEY_SCALE).to_string())
        .unwrap_or_default()
}

fn currency_code(currency: &Option<Currency>) -> String {
    currency.as_ref().map(|c| c.code.clone()).unwrap_or_default()
}

fn date_text(value: Option<NaiveDate>) -> String {
    value.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// =============================================================================
// JSON
// =============================================================================

#[derive(Serialize)]
struct ItemDocument<'a> {
    id: Uuid,
    name: &'a str,
    description: Option<&'a str>,
    quantity: i32,
    important: bool,
    purchase_price: Option<Number>,
    purchase_currency: Option<CurrencyRef<'a>>,
    purchase_date: Option<NaiveDate>,
    purchase_from: Option<&'a str>,
    manufacturer: Option<&'a str>,
    model_number: Option<&'a str>,
    serial_number: Option<&'a str>,
    notes: Option<&'a str>,
    warranty_expires: Option<NaiveDate>,
    warranty_info: Option<&'a str>,
    sold: bool,
    sold_date: Option<NaiveDate>,
    sold_price: Option<Number>,
    sold_currency: Option<CurrencyRef<'a>>,
    sold_to: Option<&'a str>,
    insured: bool,
    insured_value: Option<Number>,
    insured_currency: Option<CurrencyRef<'a>>,
    insurance_details: Option<&'a str>,
    location: Option<LocationRef<'a>>,
    labels: Vec<LabelRef<'a>>,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
    custom_fields: &'a JsonValue,
    attachments: Vec<AttachmentDocument<'a>>,
    maintenance_records: Vec<MaintenanceDocument<'a>>,
}

#[derive(Serialize)]
struct CurrencyRef<'a> {
    id: Uuid,
    code: &'a str,
    symbol: &'a str,
}

#[derive(Serialize)]
struct MaintenanceCurrencyRef<'a> {
    id: Uuid,
    code: &'a str,
}

#[derive(Serialize)]
struct LocationRef<'a> {
    id: Uuid,
    name: &'a str,
}

#[derive(Serialize)]
struct LabelRef<'a> {
    id: Uuid,
    name: &'a str,
    color: &'a str,
}

#[derive(Serialize)]
struct AttachmentDocument<'a> {
    id: Uuid,
    name: &'a str,
    content_type: Option<&'a str>,
    size: i64,
    is_primary: bool,
    created_at: &'a DateTime<Utc>,
    file_url: String,
    thumbnail_url: Option<String>,
}

#[derive(Serialize)]
struct MaintenanceDocument<'a> {
    id: Uuid,
    date: NaiveDate,
    cost: Option<Number>,
    currency: Option<MaintenanceCurrencyRef<'a>>,
    description: &'a str,
    next_service_date: Option<NaiveDate>,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
}

/// Render items as a pretty-printed JSON array.
///
/// Attachment URLs are `base_url` + `/media/` + storage path.
pub fn export_json(items: &[ItemGraph], base_url: &str) -> Result<Vec<u8>> {
    let documents: Vec<ItemDocument<'_>> = items
        .iter()
        .map(|graph| item_document(graph, base_url))
        .collect();
    Ok(serde_json::to_vec_pretty(&documents)?)
}

fn item_document<'a>(graph: &'a ItemGraph, base_url: &str) -> ItemDocument<'a> {
    let item = &graph.item;
    ItemDocument {
        id: item.id,
        name: &item.name,
        description: item.description.as_deref(),
        quantity: item.quantity,
        important: item.important,
        purchase_price: money_number(&item.purchase_price),
        purchase_currency: graph.purchase_currency.as_ref().map(currency_ref),
        purchase_date: item.purchase_date,
        purchase_from: item.purchase_from.as_deref(),
        manufacturer: item.manufacturer.as_deref(),
        model_number: item.model_number.as_deref(),
        serial_number: item.serial_number.as_deref(),
        notes: item.notes.as_deref(),
        warranty_expires: item.warranty_expires,
        warranty_info: item.warranty_info.as_deref(),
        sold: item.sold,
        sold_date: item.sold_date,
        sold_price: money_number(&item.sold_price),
        sold_currency: graph.sold_currency.as_ref().map(currency_ref),
        sold_to: item.sold_to.as_deref(),
        insured: item.insured,
        insured_value: money_number(&item.insured_value),
        insured_currency: graph.insured_currency.as_ref().map(currency_ref),
        insurance_details: item.insurance_details.as_deref(),
        location: graph.location.as_ref().map(location_ref),
        labels: graph.labels.iter().map(label_ref).collect(),
        created_at: &item.created_at,
        updated_at: &item.updated_at,
        custom_fields: &item.custom_fields,
        attachments: graph
            .attachments
            .iter()
            .map(|a| attachment_document(a, base_url))
            .collect(),
        maintenance_records: graph
            .maintenance_records
            .iter()
            .map(maintenance_document)
            .collect(),
    }
}

fn currency_ref(c: &Currency) -> CurrencyRef<'_> {
    CurrencyRef {
        id: c.id,
        code: &c.code,
        symbol: &c.symbol,
    }
}

fn location_ref(l: &Location) -> LocationRef<'_> {
    LocationRef {
        id: l.id,
        name: &l.name,
    }
}

fn label_ref(l: &Label) -> LabelRef<'_> {
    LabelRef {
        id: l.id,
        name: &l.name,
        color: &l.color,
    }
}

fn attachment_document<'a>(a: &'a Attachment, base_url: &str) -> AttachmentDocument<'a> {
    AttachmentDocument {
        id: a.id,
        name: &a.name,
        content_type: a.content_type.as_deref(),
        size: a.size,
        is_primary: a.is_primary,
        created_at: &a.created_at,
        file_url: media_url(base_url, &a.file_path),
        thumbnail_url: a.thumbnail_path.as_deref().map(|p| media_url(base_url, p)),
    }
}

fn maintenance_document(entry: &MaintenanceEntry) -> MaintenanceDocument<'_> {
    let record = &entry.record;
    MaintenanceDocument {
        id: record.id,
        date: record.date,
        cost: money_number(&record.cost),
        currency: entry.currency.as_ref().map(|c| MaintenanceCurrencyRef {
            id: c.id,
            code: &c.code,
        }),
        description: &record.description,
        next_service_date: record.next_service_date,
        created_at: &record.created_at,
        updated_at: &record.updated_at,
    }
}

/// Absolute URL for a stored media path.
pub fn media_url(base_url: &str, path: &str) -> String {
    format!(
        "{}{}{}",
        base_url.trim_end_matches('/'),
        MEDIA_URL_PREFIX,
        path.trim_start_matches('/')
    )
}

/// Decimal as a JSON float. Zero stays `0.0` rather than null.
fn money_number(value: &Option<BigDecimal>) -> Option<Number> {
    value
        .as_ref()
        .and_then(|d| d.to_string().parse::<f64>().ok())
        .and_then(Number::from_f64)
}

// =============================================================================
// SERVICE
// =============================================================================

/// A rendered export ready to send.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub item_count: usize,
    pub log_id: Uuid,
}

/// File name for an export taken at `at`.
pub fn export_file_name(format: DataFormat, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}.{}",
        EXPORT_FILE_PREFIX,
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Loads, renders and logs exports.
#[derive(Clone)]
pub struct ExportService {
    items: Arc<dyn ItemRepository>,
    logs: Arc<dyn ImportLogRepository>,
}

impl ExportService {
    pub fn new(items: Arc<dyn ItemRepository>, logs: Arc<dyn ImportLogRepository>) -> Self {
        Self { items, logs }
    }

    /// Export the owner's items matching `filter`.
    ///
    /// The ImportLog entry is written only after rendering succeeds.
    pub async fn export(
        &self,
        owner: Uuid,
        format: DataFormat,
        filter: &ItemFilter,
        base_url: &str,
    ) -> Result<ExportFile> {
        let start = Instant::now();
        let graphs = self.items.list_graphs(owner, filter).await?;
        let bytes = match format {
            DataFormat::Csv => export_csv(&graphs)?,
            DataFormat::Json => export_json(&graphs, base_url)?,
        };
        let file_name = export_file_name(format, Utc::now());

        let log = self
            .logs
            .start(
                owner,
                NewImportLog {
                    file_name: file_name.clone(),
                    file_size: bytes.len() as i64,
                    import_type: format.export_kind(),
                },
            )
            .await?;
        let log = self
            .logs
            .complete(owner, log.id, ImportLogCompletion::export_success())
            .await?;

        info!(
            subsystem = "export",
            component = "exporter",
            op = "export",
            owner_id = %owner,
            import_log_id = %log.id,
            format = %format,
            record_count = graphs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Export completed"
        );

        Ok(ExportFile {
            file_name,
            content_type: format.content_type(),
            bytes,
            item_count: graphs.len(),
            log_id: log.id,
        })
    }
}
