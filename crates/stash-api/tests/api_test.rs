//! Router tests over the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use stash_api::{build_router, ApiConfig, AppState};
use stash_core::memory::MemoryStore;
use stash_core::ReferenceRepository;

const BOUNDARY: &str = "stash-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    owner: Uuid,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let router = build_router(AppState::in_memory(store.clone(), ApiConfig::default()));
        Self {
            router,
            store,
            owner: Uuid::now_v7(),
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", self.owner.to_string())
    }

    fn multipart(&self, uri: &str, file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content
        );
        self.request("POST", uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn raw_json(&self, content: &str) -> Request<Body> {
        self.request("POST", "/api/v1/items/import/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(content.to_string()))
            .unwrap()
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = TestApp::new();
    let request = Request::get("/api/v1/import-logs")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn test_raw_json_import_created() {
    let app = TestApp::new();
    let (status, body) = app
        .send_json(app.raw_json(
            r#"[{"name": "Drill", "location": {"name": "Garage"}},
                {"name": "Saw", "location": "Garage"}]"#,
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], "Imported 2 items (2 created, 0 updated)");
    assert_eq!(body["created"], 2);
    assert_eq!(body["failed"], 0);
    assert!(body["errors"].is_null());
    assert_eq!(body["status"], "Success");
    assert!(body["log_id"].is_string());

    let locations = app.store.list_locations(app.owner).await.unwrap();
    assert_eq!(locations.len(), 1);
}

#[tokio::test]
async fn test_csv_import_with_failed_row_is_multi_status() {
    let app = TestApp::new();
    let csv = "Name,Quantity,Location\nDrill,2,Garage\n,1,Shed\nSaw,1,\n";
    let (status, body) = app
        .send_json(app.multipart("/api/v1/items/import/csv", "items.csv", csv))
        .await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["status"], "Partial Success");
    assert_eq!(body["created"], 2);
    assert_eq!(body["failed"], 1);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().starts_with("Row 2:"));
}

#[tokio::test]
async fn test_csv_import_requires_file_field() {
    let app = TestApp::new();
    let request = app
        .request("POST", "/api/v1/items/import/csv")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(format!("--{}--\r\n", BOUNDARY)))
        .unwrap();
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'file'"));
}

#[tokio::test]
async fn test_undecodable_json_is_bad_request_with_failed_log() {
    let app = TestApp::new();
    let (status, body) = app.send_json(app.raw_json("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap().to_string();
    assert!(message.starts_with("Invalid JSON"));

    let (status, logs) = app
        .send_json(
            app.request("GET", "/api/v1/import-logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs[0]["status"], "Failed");
    assert_eq!(logs[0]["import_type"], "JSON Import");
    assert_eq!(logs[0]["error_message"], message.as_str());
}

#[tokio::test]
async fn test_empty_json_array_is_no_data() {
    let app = TestApp::new();
    let (status, body) = app.send_json(app.raw_json("[]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No data provided");

    let (_, logs) = app
        .send_json(
            app.request("GET", "/api/v1/import-logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(logs.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_export_csv_download() {
    let app = TestApp::new();
    app.send(app.raw_json(r#"[{"name": "Drill", "insured": true}, {"name": "Saw"}]"#))
        .await;

    let request = app
        .request("GET", "/api/v1/items/export/csv?insured=true")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"stash_export_"));
    assert!(disposition.ends_with(".csv\""));
    assert!(headers.contains_key("x-import-log-id"));

    let text = String::from_utf8(body).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Name,Description,Quantity"));
    assert!(lines.next().unwrap().starts_with("Drill,"));
    assert!(lines.next().is_none());
}

#[tokio::test]
async fn test_invalid_filter_is_bad_request() {
    let app = TestApp::new();
    let request = app
        .request("GET", "/api/v1/items/export/json?location=garage")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid filter"));
}

#[tokio::test]
async fn test_import_logs_are_owner_scoped() {
    let app = TestApp::new();
    let (_, body) = app.send_json(app.raw_json(r#"{"name": "Lamp"}"#)).await;
    let log_id = body["log_id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/import-logs/{}", log_id);
    let (status, log) = app
        .send_json(app.request("GET", &uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["items_created"], 1);

    let stranger = Request::get(&uri)
        .header("x-user-id", Uuid::now_v7().to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send_json(stranger).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_import_logs_reject_unknown_ordering() {
    let app = TestApp::new();
    let request = app
        .request("GET", "/api/v1/import-logs?ordering=file_name")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_init_default_currencies_is_idempotent() {
    let app = TestApp::new();
    let init = || {
        app.request("POST", "/api/v1/currencies/init-defaults")
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = app.send_json(init()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Created 5 default currencies");

    let (_, body) = app.send_json(init()).await;
    assert_eq!(body["message"], "Created 0 default currencies");
}

#[tokio::test]
async fn test_delete_location() {
    let app = TestApp::new();
    app.send(app.raw_json(r#"{"name": "Drill", "location": "Garage"}"#))
        .await;
    let garage = app.store.list_locations(app.owner).await.unwrap()[0].id;

    let uri = format!("/api/v1/locations/{}", garage);
    let (status, _, _) = app
        .send(app.request("DELETE", &uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send_json(app.request("DELETE", &uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
