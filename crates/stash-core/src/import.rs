//! Import orchestration.
//!
//! Decodes an uploaded file into raw records, then for each record in input
//! order: normalize, validate, resolve references, upsert. Record failures
//! are tallied in an [`ImportAccumulator`] and never abort the batch. The
//! surrounding [`ImportService::run`] owns the ImportLog lifecycle.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info, trace, warn};
use uuid::Uuid;

use crate::defaults::MAX_REPORTED_ERRORS;
use crate::error::{Error, Result};
use crate::models::{
    DataFormat, ImportLogCompletion, ImportStatus, ItemUpsert, NewImportLog, UpsertOutcome,
};
use crate::normalize::{normalize, CsvRow, RawRecord};
use crate::resolve::ReferenceResolver;
use crate::traits::{ImportLogRepository, ItemRepository};

/// An uploaded import payload.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub file_name: String,
    pub format: DataFormat,
    pub bytes: Vec<u8>,
}

/// Result of writing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordWrite {
    pub outcome: UpsertOutcome,
    pub warnings: usize,
}

/// Running tally for one batch, threaded by value through the record loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAccumulator {
    format: DataFormat,
    created: u32,
    updated: u32,
    failed: u32,
    warnings: u32,
    errors: Vec<String>,
    suppressed_errors: u32,
}

impl ImportAccumulator {
    pub fn new(format: DataFormat) -> Self {
        Self {
            format,
            created: 0,
            updated: 0,
            failed: 0,
            warnings: 0,
            errors: Vec::new(),
            suppressed_errors: 0,
        }
    }

    /// Fold one record's result into the tally. `position` is 1-based.
    pub fn absorb(mut self, position: usize, result: Result<RecordWrite>) -> Self {
        match result {
            Ok(write) => {
                match write.outcome {
                    UpsertOutcome::Created(_) => self.created += 1,
                    UpsertOutcome::Updated(_) => self.updated += 1,
                }
                self.warnings += write.warnings as u32;
            }
            Err(err) => {
                self.failed += 1;
                if self.errors.len() < MAX_REPORTED_ERRORS {
                    self.errors.push(format!(
                        "{} {}: {}",
                        record_noun(self.format),
                        position,
                        record_error_text(&err)
                    ));
                } else {
                    self.suppressed_errors += 1;
                }
            }
        }
        self
    }

    /// Close the tally and derive the final status.
    pub fn finish(self) -> ImportSummary {
        ImportSummary {
            log_id: None,
            status: ImportStatus::from_counts(self.created + self.updated, self.failed),
            created: self.created,
            updated: self.updated,
            failed: self.failed,
            warnings: self.warnings,
            errors: self.errors,
            suppressed_errors: self.suppressed_errors,
        }
    }
}

fn record_noun(format: DataFormat) -> &'static str {
    match format {
        DataFormat::Csv => "Row",
        DataFormat::Json => "Record",
    }
}

fn no_data() -> Error {
    Error::InvalidInput("No data provided".to_string())
}

/// Message of an error as shown to the user: caller-facing variants drop
/// their display prefix.
fn record_error_text(err: &Error) -> String {
    match err {
        Error::InvalidInput(msg) | Error::NotFound(msg) | Error::Conflict(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Outcome of an import batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Set once the batch is tied to a persisted ImportLog.
    pub log_id: Option<Uuid>,
    pub status: ImportStatus,
    pub created: u32,
    pub updated: u32,
    pub failed: u32,
    /// Coercion warnings across all written records.
    pub warnings: u32,
    /// At most the first ten record errors, verbatim.
    pub errors: Vec<String>,
    /// Record errors beyond the first ten.
    pub suppressed_errors: u32,
}

impl ImportSummary {
    /// Human-readable headline, e.g. `Imported 3 items (2 created, 1 updated)`.
    pub fn success_message(&self) -> String {
        format!(
            "Imported {} items ({} created, {} updated)",
            self.created + self.updated,
            self.created,
            self.updated
        )
    }

    /// Error text stored on the ImportLog.
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let mut message = self.errors.join("\n");
        if self.suppressed_errors > 0 {
            message.push_str(&format!("\n...and {} more errors", self.suppressed_errors));
        }
        Some(message)
    }

    pub fn completion(&self) -> ImportLogCompletion {
        ImportLogCompletion {
            status: self.status,
            items_created: self.created as i32,
            items_updated: self.updated as i32,
            items_failed: self.failed as i32,
            error_message: self.error_message(),
        }
    }
}

/// Decode a whole payload into raw records.
///
/// Any failure here is fatal for the batch and reported as `InvalidInput`.
pub fn decode_records(format: DataFormat, bytes: &[u8]) -> Result<Vec<RawRecord>> {
    match format {
        DataFormat::Csv => decode_csv(bytes),
        DataFormat::Json => decode_json(bytes),
    }
}

fn decode_csv(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::InvalidInput(format!("File is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("Could not read CSV header: {}", e)))?
        .clone();
    if !headers.iter().any(|h| h.trim().eq_ignore_ascii_case("name")) {
        return Err(Error::InvalidInput(
            "CSV header has no Name column".to_string(),
        ));
    }

    reader
        .records()
        .map(|row| {
            let row = row.map_err(|e| Error::InvalidInput(format!("Could not read CSV: {}", e)))?;
            Ok(RawRecord::Csv(CsvRow::from_pairs(
                headers.iter().zip(row.iter()),
            )))
        })
        .collect()
}

fn decode_json(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let document: JsonValue = serde_json::from_slice(bytes)
        .map_err(|e| Error::InvalidInput(format!("Invalid JSON: {}", e)))?;
    match document {
        JsonValue::Array(entries) => Ok(entries.into_iter().map(RawRecord::Json).collect()),
        JsonValue::Object(fields) if fields.is_empty() => Ok(Vec::new()),
        obj @ JsonValue::Object(_) => Ok(vec![RawRecord::Json(obj)]),
        _ => Err(Error::InvalidInput(
            "Expected a JSON array of items".to_string(),
        )),
    }
}

/// Runs imports against the entity store.
#[derive(Clone)]
pub struct ImportService {
    items: Arc<dyn ItemRepository>,
    resolver: ReferenceResolver,
    logs: Arc<dyn ImportLogRepository>,
}

impl ImportService {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        resolver: ReferenceResolver,
        logs: Arc<dyn ImportLogRepository>,
    ) -> Self {
        Self {
            items,
            resolver,
            logs,
        }
    }

    /// Import a payload, recording the operation in an ImportLog.
    ///
    /// Per-record failures are reported in the summary. A payload that
    /// cannot be decoded completes the log as `Failed` and is returned as
    /// `InvalidInput`. Empty bytes and an empty JSON document (`[]` or `{}`)
    /// are rejected before any log is written.
    pub async fn run(&self, owner: Uuid, request: ImportRequest) -> Result<ImportSummary> {
        if request.bytes.is_empty() {
            return Err(no_data());
        }
        let start = Instant::now();
        let format = request.format;
        let decoded = decode_records(format, &request.bytes);
        if format == DataFormat::Json && matches!(&decoded, Ok(records) if records.is_empty()) {
            return Err(no_data());
        }

        let log = self
            .logs
            .start(
                owner,
                NewImportLog {
                    file_name: request.file_name,
                    file_size: request.bytes.len() as i64,
                    import_type: format.import_kind(),
                },
            )
            .await?;

        let records = match decoded {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    subsystem = "import",
                    component = "orchestrator",
                    op = "run_import",
                    owner_id = %owner,
                    import_log_id = %log.id,
                    format = %format,
                    error = %err,
                    "Import payload could not be decoded"
                );
                if let Err(log_err) = self
                    .logs
                    .complete(
                        owner,
                        log.id,
                        ImportLogCompletion::failed(record_error_text(&err)),
                    )
                    .await
                {
                    error!(
                        subsystem = "import",
                        component = "orchestrator",
                        import_log_id = %log.id,
                        error = %log_err,
                        "Failed to mark import log as failed"
                    );
                }
                return Err(err);
            }
        };

        let mut summary = self.import_records(owner, format, records).await;
        summary.log_id = Some(log.id);
        self.logs.complete(owner, log.id, summary.completion()).await?;

        info!(
            subsystem = "import",
            component = "orchestrator",
            op = "run_import",
            owner_id = %owner,
            import_log_id = %log.id,
            format = %format,
            status = %summary.status,
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
            warning_count = summary.warnings,
            duration_ms = start.elapsed().as_millis() as u64,
            "Import completed"
        );
        Ok(summary)
    }

    /// Process already-decoded records in order. Never fails as a whole.
    pub async fn import_records(
        &self,
        owner: Uuid,
        format: DataFormat,
        records: Vec<RawRecord>,
    ) -> ImportSummary {
        let mut acc = ImportAccumulator::new(format);
        for (index, record) in records.iter().enumerate() {
            let position = index + 1;
            let result = self.import_record(owner, record).await;
            match &result {
                Ok(write) => trace!(
                    subsystem = "import",
                    component = "orchestrator",
                    record_index = position,
                    item_id = %write.outcome.id(),
                    "Record imported"
                ),
                Err(err) => warn!(
                    subsystem = "import",
                    component = "orchestrator",
                    owner_id = %owner,
                    record_index = position,
                    error = %err,
                    "Record failed"
                ),
            }
            acc = acc.absorb(position, result);
        }
        acc.finish()
    }

    async fn import_record(&self, owner: Uuid, record: &RawRecord) -> Result<RecordWrite> {
        let normalized = normalize(record)?;
        normalized.fields.validated_name()?;
        let references = self
            .resolver
            .resolve_all(owner, &normalized.references)
            .await?;
        let outcome = self
            .items
            .upsert(
                owner,
                ItemUpsert {
                    fields: normalized.fields,
                    references,
                },
            )
            .await?;
        Ok(RecordWrite {
            outcome,
            warnings: normalized.warnings.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> Result<RecordWrite> {
        Ok(RecordWrite {
            outcome: UpsertOutcome::Created(Uuid::nil()),
            warnings: 0,
        })
    }

    fn failed(msg: &str) -> Result<RecordWrite> {
        Err(Error::InvalidInput(msg.to_string()))
    }

    #[test]
    fn test_accumulator_counts_and_status() {
        let summary = ImportAccumulator::new(DataFormat::Json)
            .absorb(1, created())
            .absorb(
                2,
                Ok(RecordWrite {
                    outcome: UpsertOutcome::Updated(Uuid::nil()),
                    warnings: 2,
                }),
            )
            .absorb(3, failed("Item name is required"))
            .finish();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.status, ImportStatus::PartialSuccess);
        assert_eq!(summary.errors, vec!["Record 3: Item name is required"]);
        assert_eq!(summary.success_message(), "Imported 2 items (1 created, 1 updated)");
    }

    #[test]
    fn test_all_failed_is_failed() {
        let summary = ImportAccumulator::new(DataFormat::Csv)
            .absorb(1, failed("bad"))
            .finish();
        assert_eq!(summary.status, ImportStatus::Failed);
        assert_eq!(summary.errors, vec!["Row 1: bad"]);
    }

    #[test]
    fn test_empty_batch_is_success() {
        let summary = ImportAccumulator::new(DataFormat::Csv).finish();
        assert_eq!(summary.status, ImportStatus::Success);
        assert_eq!(summary.error_message(), None);
    }

    #[test]
    fn test_error_truncation() {
        let mut acc = ImportAccumulator::new(DataFormat::Json);
        for i in 1..=13 {
            acc = acc.absorb(i, failed("boom"));
        }
        let summary = acc.finish();
        assert_eq!(summary.failed, 13);
        assert_eq!(summary.errors.len(), MAX_REPORTED_ERRORS);
        assert_eq!(summary.suppressed_errors, 3);

        let message = summary.error_message().unwrap();
        assert_eq!(message.lines().count(), 11);
        assert!(message.starts_with("Record 1: boom\n"));
        assert!(message.ends_with("\n...and 3 more errors"));
        assert_eq!(summary.completion().items_failed, 13);
    }

    #[test]
    fn test_decode_csv() {
        let bytes = "\u{feff}Name,Quantity\nDrill,2\n\"Saw, hand\",\n".as_bytes();
        let records = decode_records(DataFormat::Csv, bytes).unwrap();
        assert_eq!(records.len(), 2);
        let RawRecord::Csv(row) = &records[1] else {
            panic!("expected csv row");
        };
        assert_eq!(row.get("Name"), Some("Saw, hand"));
        assert_eq!(row.get("Quantity"), Some(""));
    }

    #[test]
    fn test_decode_csv_requires_name_column() {
        let err = decode_records(DataFormat::Csv, b"Title,Qty\nx,1\n").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_decode_csv_rejects_invalid_utf8() {
        let err = decode_records(DataFormat::Csv, &[b'N', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_decode_json_shapes() {
        assert_eq!(decode_records(DataFormat::Json, b"[{}, 1]").unwrap().len(), 2);
        assert_eq!(decode_records(DataFormat::Json, b"{\"name\": \"x\"}").unwrap().len(), 1);
        assert!(decode_records(DataFormat::Json, b"[]").unwrap().is_empty());
        assert!(decode_records(DataFormat::Json, b" {} ").unwrap().is_empty());
        assert!(decode_records(DataFormat::Json, b"\"items\"").is_err());
        assert!(decode_records(DataFormat::Json, b"[{").is_err());
    }
}
