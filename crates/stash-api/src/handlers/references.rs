//! Reference entity handlers: default currencies and deletion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use stash_core::ReferenceKind;

use crate::{ApiError, AppState, RequireAuth};

/// Create the standard currencies (USD, EUR, GBP, JPY, CNY) that the
/// caller does not have yet.
///
/// # Returns
/// - 200 OK with `{"message": "Created N default currencies"}`
pub async fn init_default_currencies(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<JsonValue>, ApiError> {
    let created = state.resolver.init_default_currencies(auth.owner).await?;
    Ok(Json(json!({
        "message": format!("Created {} default currencies", created),
    })))
}

async fn delete_reference(
    state: &AppState,
    owner: Uuid,
    kind: ReferenceKind,
    id: Uuid,
) -> Result<StatusCode, ApiError> {
    state.resolver.delete(owner, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a location. Items stored there keep existing without a location.
pub async fn delete_location(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    delete_reference(&state, auth.owner, ReferenceKind::Location, id).await
}

/// Delete a label and detach it from every item.
pub async fn delete_label(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    delete_reference(&state, auth.owner, ReferenceKind::Label, id).await
}

/// Delete a currency, clearing it from item prices and maintenance costs.
pub async fn delete_currency(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    delete_reference(&state, auth.owner, ReferenceKind::Currency, id).await
}
