//! Import log HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use stash_core::{ImportLog, ImportLogOrdering, ImportLogRepository, ListImportLogsRequest};

use crate::{ApiError, AppState, RequireAuth};

/// Query parameters for listing import logs.
#[derive(Debug, Default, Deserialize)]
pub struct ListImportLogsQuery {
    /// `created_at`, `-created_at` (default), `completed_at`,
    /// `-completed_at`, `status` or `-status`.
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListImportLogsQuery {
    fn into_request(self) -> Result<ListImportLogsRequest, ApiError> {
        let defaults = ListImportLogsRequest::default();
        let ordering = match self.ordering.as_deref() {
            None | Some("") => ImportLogOrdering::default(),
            Some(raw) => raw.parse().map_err(ApiError::BadRequest)?,
        };
        Ok(ListImportLogsRequest {
            ordering,
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        }
        .clamped())
    }
}

/// List the caller's import and export logs.
///
/// # Returns
/// - 200 OK with an array of logs
/// - 400 Bad Request for an unknown `ordering`
pub async fn list_import_logs(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ListImportLogsQuery>,
) -> Result<Json<Vec<ImportLog>>, ApiError> {
    let req = query.into_request()?;
    let logs = state.import_logs.list(auth.owner, req).await?;
    Ok(Json(logs))
}

/// Get one import log.
///
/// # Returns
/// - 200 OK with the log
/// - 404 Not Found if it does not exist or belongs to another user
pub async fn get_import_log(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ImportLog>, ApiError> {
    let log = state
        .import_logs
        .get(auth.owner, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import log {} not found", id)))?;
    Ok(Json(log))
}
