use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gdpr_deletion_service::config::Config;
use gdpr_deletion_service::test_utils::{RecordingEmailGateway, TestServerBuilder};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/auth/realms/master/protocol/openid-connect/token";
const USERS_PATH: &str = "/auth/admin/realms/app/users";
const USERINFO_PATH: &str = "/auth/realms/app/protocol/openid-connect/userinfo";

fn test_config(idp_base: &str) -> Config {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.flows.link_secret = "test-link-secret".to_string();
    config.keycloak.base_url = idp_base.to_string();
    config.keycloak.realm = "app".to_string();
    config.keycloak.client_id = "admin-cli".to_string();
    config.keycloak.admin_username = "admin".to_string();
    config.keycloak.admin_password = "admin-pw".to_string();
    config.admin.api_key = Some("test-admin-key".to_string());
    config
}

async fn build_app(idp_base: &str) -> (Router, Arc<RecordingEmailGateway>) {
    let gateway = RecordingEmailGateway::new();
    let server = TestServerBuilder::new()
        .with_config(test_config(idp_base))
        .with_email_gateway(gateway.clone())
        .build()
        .await;
    (server.create_app(), gateway)
}

async fn mock_admin_token(mock: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "admin-token"})),
        )
        .mount(mock)
        .await;
}

fn json_request(method_name: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method_name)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pull a query parameter value out of the confirmation link in the email.
fn link_param(body: &str, name: &str) -> String {
    let marker = format!("{name}=");
    let start = body.find(&marker).expect("parameter present") + marker.len();
    body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '%' || *c == '-')
        .collect::<String>()
        .replace("%40", "@")
}

#[tokio::test]
async fn test_full_public_flow_deletes_account() {
    let mock = MockServer::start().await;
    mock_admin_token(&mock).await;
    Mock::given(method("GET"))
        .and(path(USERS_PATH))
        .and(query_param("email", "user@example.com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": "kc-user-1", "email": "user@example.com"}])),
        )
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/kc-user-1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    let (app, gateway) = build_app(&mock.uri()).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["show_code_input"], true);

    let email = gateway.last().await.expect("confirmation email sent");
    assert_eq!(email.to, "user@example.com");
    let code = link_param(&email.body, "code");
    assert_eq!(code.len(), 6);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "user@example.com", "code": code}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted"], true);

    // The code is single use
    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "user@example.com", "code": code}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn test_invalid_email_rejected() {
    let mock = MockServer::start().await;
    let (app, gateway) = build_app(&mock.uri()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "not-an-email"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(gateway.sent().await.is_empty());
}

#[tokio::test]
async fn test_wrong_code_never_reaches_identity_provider() {
    let mock = MockServer::start().await;
    // No mocks mounted: any Keycloak call would 404 and fail loudly
    let (app, _gateway) = build_app(&mock.uri()).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "user@example.com", "code": "000000"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["deleted"], false);
    assert!(mock.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_user_reports_not_found_after_search_retry() {
    let mock = MockServer::start().await;
    mock_admin_token(&mock).await;
    // An empty result is searched again on a fresh token before giving up
    Mock::given(method("GET"))
        .and(path(USERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&mock)
        .await;

    let (app, gateway) = build_app(&mock.uri()).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "ghost@example.com"}),
        ))
        .await
        .unwrap();
    let email = gateway.last().await.unwrap();
    let code = link_param(&email.body, "code");

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "ghost@example.com", "code": code}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_token_failure_retries_three_times() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&mock)
        .await;

    let (app, gateway) = build_app(&mock.uri()).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    let code = link_param(&gateway.last().await.unwrap().body, "code");

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "user@example.com", "code": code}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // Mock verifies the token endpoint saw exactly 3 attempts
}

#[tokio::test]
async fn test_delete_retries_once_after_transient_failure() {
    let mock = MockServer::start().await;
    mock_admin_token(&mock).await;
    Mock::given(method("GET"))
        .and(path(USERS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "kc-user-5"}])),
        )
        .mount(&mock)
        .await;
    // First delete attempt fails server-side, the retry on a fresh token lands
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/kc-user-5")))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/kc-user-5")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    let (app, gateway) = build_app(&mock.uri()).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    let code = link_param(&gateway.last().await.unwrap().body, "code");

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "user@example.com", "code": code}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted"], true);
}

#[tokio::test]
async fn test_delete_gives_up_after_two_attempts() {
    let mock = MockServer::start().await;
    mock_admin_token(&mock).await;
    Mock::given(method("GET"))
        .and(path(USERS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "kc-user-6"}])),
        )
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/kc-user-6")))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&mock)
        .await;

    let (app, gateway) = build_app(&mock.uri()).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    let code = link_param(&gateway.last().await.unwrap().body, "code");

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "user@example.com", "code": code}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // Mock verifies the delete endpoint saw exactly 2 attempts
}

#[tokio::test]
async fn test_email_failure_rolls_back_code() {
    let mock = MockServer::start().await;
    let (app, gateway) = build_app(&mock.uri()).await;

    gateway.fail_sends(true);
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);

    // A later request succeeds and issues a fresh, working code
    gateway.fail_sends(false);
    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(gateway.last().await.is_some());
}

#[tokio::test]
async fn test_link_confirmation_and_forged_signature() {
    let mock = MockServer::start().await;
    mock_admin_token(&mock).await;
    Mock::given(method("GET"))
        .and(path(USERS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "kc-user-2"}])),
        )
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/kc-user-2")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock)
        .await;

    let (app, gateway) = build_app(&mock.uri()).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    let email_body = gateway.last().await.unwrap().body;
    let code = link_param(&email_body, "code");
    let token = link_param(&email_body, "token");

    // Forged signature is rejected before the code is spent
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/deletion/confirm?email=user@example.com&code={code}&token=forged"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The genuine link still works afterwards
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/deletion/confirm?email=user@example.com&code={code}&token={token}"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_api_deletes_account() {
    let mock = MockServer::start().await;
    mock_admin_token(&mock).await;
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"sub": "kc-user-3", "email": "user@example.com"})),
        )
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/kc-user-3")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    let (app, _gateway) = build_app(&mock.uri()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .header("Authorization", "Bearer aaa.bbb.ccc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["email"], "user@example.com");
}

#[tokio::test]
async fn test_token_api_rejects_malformed_and_invalid_tokens() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock)
        .await;

    let (app, _gateway) = build_app(&mock.uri()).await;

    // Not even JWT-shaped: rejected without any upstream call
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .header("Authorization", "Bearer opaque-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(mock.received_requests().await.unwrap().is_empty());

    // Shaped but rejected by the userinfo endpoint
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .header("Authorization", "Bearer aaa.bbb.ccc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_token");

    // Missing header entirely
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_api_disabled_returns_service_unavailable() {
    let mock = MockServer::start().await;
    let mut config = test_config(&mock.uri());
    config.flows.enable_token_api = false;
    let server = TestServerBuilder::new().with_config(config).build().await;

    let response = server
        .create_app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .header("Authorization", "Bearer aaa.bbb.ccc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"], "api_disabled");
}

#[tokio::test]
async fn test_public_flow_disabled_returns_service_unavailable() {
    let mock = MockServer::start().await;
    let mut config = test_config(&mock.uri());
    config.flows.enable_public_flow = false;
    let server = TestServerBuilder::new().with_config(config).build().await;

    let response = server
        .create_app()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_token_api_rate_limited_per_ip() {
    let mock = MockServer::start().await;
    let mut config = test_config(&mock.uri());
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_secs = 300;
    let server = TestServerBuilder::new().with_config(config).build().await;
    let app = server.create_app();

    let request = |ip: &str| {
        Request::builder()
            .method("DELETE")
            .uri("/api/account")
            .header("X-Real-IP", ip)
            .header("Authorization", "Bearer opaque")
            .body(Body::empty())
            .unwrap()
    };

    // Rejected attempts still consume the caller's budget
    for _ in 0..2 {
        let response = app.clone().oneshot(request("203.0.113.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.clone().oneshot(request("203.0.113.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["error"], "rate_limited");

    // A different client is unaffected
    let response = app.oneshot(request("203.0.113.10")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_base_url_with_auth_segment_is_not_doubled() {
    let mock = MockServer::start().await;
    mock_admin_token(&mock).await;
    Mock::given(method("GET"))
        .and(path(USERS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "kc-user-4"}])),
        )
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/kc-user-4")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock)
        .await;

    // Configured with an explicit /auth suffix and a trailing slash
    let (app, gateway) = build_app(&format!("{}/auth/", mock.uri())).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com"}),
        ))
        .await
        .unwrap();
    let code = link_param(&gateway.last().await.unwrap().body, "code");

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/confirm",
            json!({"email": "user@example.com", "code": code}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_german_language_email() {
    let mock = MockServer::start().await;
    let (app, gateway) = build_app(&mock.uri()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/deletion/request",
            json!({"email": "user@example.com", "language": "de"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let email = gateway.last().await.unwrap();
    assert!(email.subject.contains("Datenlöschungsanfrage"));
    assert!(email.body.contains("Bestätigungscode"));
}
