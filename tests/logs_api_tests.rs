use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gdpr_deletion_service::Server;
use gdpr_deletion_service::config::Config;
use gdpr_deletion_service::database::NewLogEntry;
use gdpr_deletion_service::database::entities::{LogAction, LogStatus};
use gdpr_deletion_service::test_utils::TestServerBuilder;
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN_KEY: &str = "test-admin-key";

async fn build_server() -> Server {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.flows.link_secret = "test-link-secret".to_string();
    config.admin.api_key = Some(ADMIN_KEY.to_string());
    TestServerBuilder::new().with_config(config).build().await
}

async fn seed(server: &Server) -> Vec<i64> {
    let dao = server.database.deletion_logs();
    let mut ids = Vec::new();
    for (email, action, status) in [
        ("alice@example.com", LogAction::Request, LogStatus::Pending),
        (
            "alice@example.com",
            LogAction::Confirmation,
            LogStatus::Success,
        ),
        ("alice@example.com", LogAction::Deletion, LogStatus::Success),
        ("bob@example.com", LogAction::Request, LogStatus::Pending),
        ("bob@example.com", LogAction::Deletion, LogStatus::Failed),
    ] {
        let id = dao
            .store(
                action,
                status,
                NewLogEntry {
                    email: email.to_string(),
                    message: "seeded".to_string(),
                    ip_address: Some("127.0.0.1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn app_with_seed() -> (Router, Vec<i64>) {
    let server = build_server().await;
    let ids = seed(&server).await;
    (server.create_app(), ids)
}

#[tokio::test]
async fn test_requires_admin_key() {
    let (app, _ids) = app_with_seed().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/logs")
                .header("Authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_no_key_configured_locks_out_admin_api() {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.flows.link_secret = "test-link-secret".to_string();
    config.admin.api_key = None;
    let server = TestServerBuilder::new().with_config(config).build().await;

    let response = server
        .create_app()
        .oneshot(get("/api/admin/logs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_logs_with_filters() {
    let (app, _ids) = app_with_seed().await;

    let response = app.clone().oneshot(get("/api/admin/logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["limit"], 50);

    // Filter by partial email, case-insensitive
    let response = app
        .clone()
        .oneshot(get("/api/admin/logs?email=ALICE"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 3);

    // Filter by action + status
    let response = app
        .clone()
        .oneshot(get("/api/admin/logs?action=deletion&status=failed"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["logs"][0]["email"], "bob@example.com");

    // Pagination
    let response = app
        .clone()
        .oneshot(get("/api/admin/logs?limit=2&offset=0&order_by=id&order=asc"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["logs"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 5);

    // Invalid date range
    let response = app
        .oneshot(get(
            "/api/admin/logs?start_date=2026-01-02T00:00:00Z&end_date=2026-01-01T00:00:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_statistics_endpoint() {
    let (app, _ids) = app_with_seed().await;

    let response = app
        .oneshot(get("/api/admin/logs/statistics?period=week"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["period"], "week");
    assert_eq!(body["total"], 5);
    assert_eq!(body["successful"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["pending"], 2);
    assert_eq!(body["trend"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_export_csv() {
    let (app, _ids) = app_with_seed().await;

    let response = app
        .oneshot(get("/api/admin/logs/export?email=bob"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/csv"));
    let disposition = response.headers().get("content-disposition").unwrap();
    assert!(disposition.to_str().unwrap().contains("deletion-logs.csv"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,email,action,status,message,ip_address,keycloak_user_id,keycloak_realm,created_at"
    );
    assert_eq!(lines.clone().count(), 2);
    assert!(lines.all(|line| line.contains("bob@example.com")));
}

#[tokio::test]
async fn test_cleanup_endpoint() {
    let (app, _ids) = app_with_seed().await;

    // Nothing is older than 30 days
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/logs/cleanup")
                .header("Authorization", format!("Bearer {ADMIN_KEY}"))
                .header("content-type", "application/json")
                .body(Body::from(json!({"days": 30}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted"], 0);

    // Zero-day retention is refused
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/logs/cleanup")
                .header("Authorization", format!("Bearer {ADMIN_KEY}"))
                .header("content-type", "application/json")
                .body(Body::from(json!({"days": 0}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_and_single_delete() {
    let (app, ids) = app_with_seed().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/logs")
                .header("Authorization", format!("Bearer {ADMIN_KEY}"))
                .header("content-type", "application/json")
                .body(Body::from(json!({"ids": [ids[0], ids[1]]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted"], 2);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/logs/{}", ids[2]))
                .header("Authorization", format!("Bearer {ADMIN_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Deleting it again is a 404
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/logs/{}", ids[2]))
                .header("Authorization", format!("Bearer {ADMIN_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
