//! Item import and export handlers.
//!
//! Imports accept `multipart/form-data` with a `file` field; JSON imports
//! also accept the document as a raw request body. Exports stream the
//! rendered file back as an attachment.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use stash_core::{DataFormat, ImportRequest, ImportStatus, ImportSummary, ItemFilter};

use crate::{ApiError, AppState, RequireAuth};

/// Response header carrying the ImportLog id of an export.
pub const IMPORT_LOG_ID_HEADER: &str = "x-import-log-id";

/// Body returned by both import endpoints.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    /// Headline, e.g. `Imported 3 items (2 created, 1 updated)`.
    pub success: String,
    pub failed: u32,
    /// First ten record errors; `null` when every record was written.
    pub errors: Option<Vec<String>>,
    pub status: ImportStatus,
    pub created: u32,
    pub updated: u32,
    pub log_id: Option<Uuid>,
}

impl From<ImportSummary> for ImportResponse {
    fn from(summary: ImportSummary) -> Self {
        Self {
            success: summary.success_message(),
            failed: summary.failed,
            errors: (!summary.errors.is_empty()).then_some(summary.errors),
            status: summary.status,
            created: summary.created,
            updated: summary.updated,
            log_id: summary.log_id,
        }
    }
}

impl ImportResponse {
    /// 201 when every record was written, 207 otherwise.
    pub fn status_code(&self) -> StatusCode {
        match self.status {
            ImportStatus::Success => StatusCode::CREATED,
            _ => StatusCode::MULTI_STATUS,
        }
    }
}

/// An uploaded file.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Pull the `file` field out of a multipart form.
async fn read_file_field(mut multipart: Multipart, fallback_name: &str) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| fallback_name.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?
                .to_vec();
            return Ok(Upload { file_name, bytes });
        }
    }
    Err(ApiError::BadRequest(
        "No file uploaded. Use field name 'file'.".to_string(),
    ))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("multipart/form-data"))
}

async fn run_import(
    state: &AppState,
    owner: Uuid,
    format: DataFormat,
    upload: Upload,
) -> Result<impl IntoResponse, ApiError> {
    debug!(
        subsystem = "api",
        component = "items_io",
        op = "import",
        owner_id = %owner,
        format = %format,
        file_size = upload.bytes.len(),
        "Import requested"
    );
    let summary = state
        .imports
        .run(
            owner,
            ImportRequest {
                file_name: upload.file_name,
                format,
                bytes: upload.bytes,
            },
        )
        .await?;
    let response = ImportResponse::from(summary);
    Ok((response.status_code(), Json(response)))
}

/// Import items from a CSV upload.
///
/// # Multipart Fields
/// - `file`: CSV document with a header row containing at least `Name`
///
/// # Returns
/// - 201 Created when every row was written
/// - 207 Multi-Status when some or all rows failed
/// - 400 Bad Request if the upload is missing, empty or not decodable
pub async fn import_csv(
    State(state): State<AppState>,
    auth: RequireAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_file_field(multipart, "import.csv").await?;
    run_import(&state, auth.owner, DataFormat::Csv, upload).await
}

/// Import items from a JSON document: an array of item objects or a
/// single object.
///
/// Accepts either a multipart `file` field or the document as the raw
/// request body. Statuses as for [`import_csv`].
pub async fn import_json(
    State(state): State<AppState>,
    auth: RequireAuth,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let upload = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        read_file_field(multipart, "import.json").await?
    } else {
        let bytes = Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {}", e)))?;
        Upload {
            file_name: "import.json".to_string(),
            bytes: bytes.to_vec(),
        }
    };
    run_import(&state, auth.owner, DataFormat::Json, upload).await
}

async fn run_export(
    state: &AppState,
    owner: Uuid,
    format: DataFormat,
    filter: Result<Query<ItemFilter>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(filter) =
        filter.map_err(|e| ApiError::BadRequest(format!("Invalid filter: {}", e.body_text())))?;

    let file = state
        .exports
        .export(owner, format, &filter, &state.config.public_base_url)
        .await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file.file_name
    ))
    .map_err(|e| ApiError::Internal(stash_core::Error::Internal(e.to_string())))?;
    let log_id = HeaderValue::from_str(&file.log_id.to_string())
        .map_err(|e| ApiError::Internal(stash_core::Error::Internal(e.to_string())))?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(file.content_type)),
        (header::CONTENT_DISPOSITION, disposition),
        (HeaderName::from_static(IMPORT_LOG_ID_HEADER), log_id),
    ];
    Ok((StatusCode::OK, headers, file.bytes))
}

/// Export the caller's items as CSV.
///
/// # Query Parameters
/// - `location`, `label`: entity ids
/// - `important`, `insured`, `sold`: booleans
/// - `q`: case-insensitive text search
pub async fn export_csv(
    State(state): State<AppState>,
    auth: RequireAuth,
    filter: Result<Query<ItemFilter>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_export(&state, auth.owner, DataFormat::Csv, filter).await
}

/// Export the caller's items as a JSON array. Filters as for [`export_csv`].
pub async fn export_json(
    State(state): State<AppState>,
    auth: RequireAuth,
    filter: Result<Query<ItemFilter>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_export(&state, auth.owner, DataFormat::Json, filter).await
}
