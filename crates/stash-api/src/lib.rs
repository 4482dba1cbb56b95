//! # stash-api
//!
//! HTTP surface for stash: CSV/JSON item import and export, the import log,
//! default currency setup and reference entity deletion. Every route below
//! `/api/v1` is scoped to the user named by the auth header.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

pub use auth::RequireAuth;
pub use config::ApiConfig;
pub use error::ApiError;
pub use state::AppState;

use handlers::{import_logs, items_io, references};

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let auth_header = HeaderName::from_bytes(config.auth_header.as_bytes())
        .unwrap_or_else(|_| HeaderName::from_static(config::DEFAULT_AUTH_HEADER));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(config.cors_origins()))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, auth_header])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(items_io::IMPORT_LOG_ID_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/items/import/csv", post(items_io::import_csv))
        .route("/api/v1/items/import/json", post(items_io::import_json))
        .route("/api/v1/items/export/csv", get(items_io::export_csv))
        .route("/api/v1/items/export/json", get(items_io::export_json))
        .route("/api/v1/import-logs", get(import_logs::list_import_logs))
        .route("/api/v1/import-logs/:id", get(import_logs::get_import_log))
        .route(
            "/api/v1/currencies/init-defaults",
            post(references::init_default_currencies),
        )
        .route("/api/v1/locations/:id", delete(references::delete_location))
        .route("/api/v1/labels/:id", delete(references::delete_label))
        .route("/api/v1/currencies/:id", delete(references::delete_currency))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(DefaultBodyLimit::max(config.max_import_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_import_bytes))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
