/// HTTP surface tests driven through the router with `oneshot`
/// Uses the in-memory store and the logging mailer
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use lead_capture_api::config::{Config, MailerSettings, NotificationSettings};
use lead_capture_api::content::ContentService;
use lead_capture_api::handlers::{app_router, AppState};
use lead_capture_api::leads::LeadService;
use lead_capture_api::mailer::LogMailer;
use lead_capture_api::notifications::Notifier;
use lead_capture_api::store::MemoryStore;

const TOKEN: &str = "test-admin-token";

/// Helper function to create test config
fn create_test_config(admin_api_token: Option<&str>) -> Config {
    Config {
        port: 3000,
        database_url: None,
        admin_api_token: admin_api_token.map(str::to_string),
        notifications: NotificationSettings {
            await_delivery: true,
            ..NotificationSettings::default()
        },
        mailer: MailerSettings {
            resend_api_key: None,
            resend_base_url: "https://api.resend.com".into(),
        },
    }
}

fn app_with(admin_api_token: Option<&str>) -> Router {
    let config = create_test_config(admin_api_token);
    let store = Arc::new(MemoryStore::new());
    let notifier = Notifier::new(Arc::new(LogMailer), config.notifications.clone());
    app_router(Arc::new(AppState {
        leads: LeadService::new(store.clone(), notifier),
        content: ContentService::new(store),
        config,
    }))
}

fn app() -> Router {
    app_with(Some(TOKEN))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn form() -> Value {
    json!({
        "first_name": "Ana",
        "last_name": "Lee",
        "email": "ana@example.com",
        "phone": "0400 000 123",
        "suburb": "Richmond",
        "timeframe": "asap",
        "interested": "yes"
    })
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = send(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn submit_then_resubmit() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/api/v1/leads", Some(form()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["reused"], false);
    assert_eq!(body["data"]["score"], 80);
    let lead_id = body["data"]["lead_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::POST, "/api/v1/leads", Some(form()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reused"], true);
    assert_eq!(body["data"]["lead_id"], lead_id.as_str());

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/leads/{}", lead_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["contact"]["category"], "hot");
}

/// Log sink shared with a test subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn submission_logs_lead_id_but_not_contact_details() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (status, body) = send(&app(), Method::POST, "/api/v1/leads", Some(form()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let lead_id = body["data"]["lead_id"].as_str().unwrap().to_string();

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains(&lead_id));
    assert!(!output.contains("ana@example.com"));
    assert!(!output.contains("0400 000 123"));
}

#[tokio::test]
async fn invalid_submission_is_rejected() {
    let mut bad = form();
    bad["email"] = json!("nope");
    let (status, body) = send(&app(), Method::POST, "/api/v1/leads", Some(bad), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn list_rejects_out_of_range_limit() {
    let (status, _) = send(&app(), Method::GET, "/api/v1/leads?limit=101", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app(), Method::GET, "/api/v1/leads?limit=5", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn malformed_list_query_uses_error_envelope() {
    let (status, body) = send(&app(), Method::GET, "/api/v1/leads?limit=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn list_rejects_offset_beyond_bigint() {
    let (status, body) = send(
        &app(),
        Method::GET,
        "/api/v1/leads?offset=18446744073709551615",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_lead_is_404() {
    let (status, body) = send(&app(), Method::GET, "/api/v1/leads/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let app = app();
    let patch = json!({ "status": "contacted" });

    let (status, _) = send(&app, Method::PATCH, "/api/v1/leads/x/status", Some(patch.clone()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::PATCH, "/api/v1/leads/x/status", Some(patch.clone()), Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::PATCH, "/api/v1/leads/x/status", Some(patch), Some(TOKEN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_closed_without_configured_token() {
    let app = app_with(None);
    let (status, _) = send(&app, Method::DELETE, "/api/v1/leads/x", None, Some(TOKEN)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_lifecycle() {
    let app = app();
    let (_, body) = send(&app, Method::POST, "/api/v1/leads", Some(form()), None).await;
    let lead_id = body["data"]["lead_id"].as_str().unwrap().to_string();
    let lead_uri = format!("/api/v1/leads/{}", lead_id);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("{}/status", lead_uri),
        Some(json!({ "status": "contacted", "notes": "Left voicemail" })),
        Some(TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["current"], "contacted");
    assert_eq!(body["data"]["status"]["history"][1]["changed_by"], "admin");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &lead_uri,
        Some(json!({ "contact": { "nickname": "A" } })),
        Some(TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &lead_uri,
        Some(json!({ "contact": { "timeframe": "6-12 months" } })),
        Some(TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["contact"]["score"], 40);
    assert_eq!(body["data"]["contact"]["category"], "warm");

    let (status, body) = send(&app, Method::DELETE, &lead_uri, None, Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["metadata"]["deleted_at"].is_string());

    // Soft-deleted leads stay readable
    let (status, _) = send(&app, Method::GET, &lead_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn footer_defaults_and_updates() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/v1/footer", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "main");
    assert!(body["data"]["message"].as_str().unwrap().contains("Stone Real Estate"));

    let (status, _) = send(&app, Method::PATCH, "/api/v1/footer", Some(json!({ "message": "Hi" })), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::PATCH, "/api/v1/footer", Some(json!({})), Some(TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/v1/form-header",
        Some(json!({ "message": "Welcome home" })),
        Some(TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Welcome home");

    let (_, body) = send(&app, Method::GET, "/api/v1/form-header", None, None).await;
    assert_eq!(body["data"]["message"], "Welcome home");
}
