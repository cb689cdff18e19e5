//! Integration tests for the upstream API clients

use intela_http::client::{
    ApiClient, BlogClient, ClientError, ClientListQuery, PortalClient, PostListQuery,
    RecaptchaVerifier,
};
use reqwest::StatusCode;
use serde_json::{Map, Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn portal(server: &MockServer) -> PortalClient {
    PortalClient::new(ApiClient::new(server.uri()).unwrap())
}

fn blog(server: &MockServer) -> BlogClient {
    BlogClient::new(ApiClient::new(server.uri()).unwrap())
}

fn posts(range: std::ops::Range<i64>) -> Value {
    Value::Array(
        range
            .map(|id| json!({ "id": id, "slug": format!("post-{id}") }))
            .collect(),
    )
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = ApiClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_login_posts_credentials_without_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "ana@example.com", "password": "secreto" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-1",
            "user": { "id": 3, "role": "admin" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = portal(&mock_server)
        .login("ana@example.com", "secreto")
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.body["token"], "tok-1");

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_bearer_token_and_query_are_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .and(header("authorization", "Bearer tok-1"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "25"))
        .and(query_param("search", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "clients": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = ClientListQuery {
        page: 2,
        limit: 25,
        search: Some("acme".into()),
    };
    let response = portal(&mock_server)
        .list_clients("tok-1", &query)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_error_statuses_are_responses_not_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expirado" })))
        .mount(&mock_server)
        .await;

    let response = portal(&mock_server).my_client("old").await.unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), Some("Token expirado"));
    assert!(matches!(
        response.into_result(),
        Err(ClientError::AuthenticationFailed(message)) if message == "Token expirado"
    ));
}

#[tokio::test]
async fn test_non_json_body_becomes_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/clients/7"))
        .and(body_json(json!({ "name": "Acme" })))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&mock_server)
        .await;

    let mut fields = Map::new();
    fields.insert("name".into(), json!("Acme"));
    let response = portal(&mock_server)
        .update_client("tok", 7, &fields)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body, json!({ "message": "Bad Gateway" }));
}

#[tokio::test]
async fn test_unreachable_upstream_is_transport_error() {
    let client = ApiClient::builder()
        .base_url("http://127.0.0.1:1")
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let err = PortalClient::new(client).my_client("tok").await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_public_blog_calls_omit_authorization() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "9"))
        .and(query_param("tag", "rust"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&mock_server)
        .await;

    let query = PostListQuery {
        page: 1,
        limit: 9,
        tag: Some("rust".into()),
    };
    let response = blog(&mock_server).get_posts(None, &query).await.unwrap();

    assert!(response.is_success());
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_get_post_by_id_scans_listing_pages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": posts(1..101) })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": posts(101..150) })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/posts/post-120"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 120, "title": "Encontrado" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = blog(&mock_server)
        .get_post_by_id(Some("tok"), 120)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Encontrado");
}

#[tokio::test]
async fn test_get_post_by_id_stops_on_short_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": posts(1..5) })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = blog(&mock_server)
        .get_post_by_id(None, 999)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, json!({ "message": "Post no encontrado" }));
}

#[tokio::test]
async fn test_get_post_by_id_stops_on_error_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = blog(&mock_server).get_post_by_id(None, 1).await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_slug_is_percent_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts/a%20b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "slug": "a b" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = blog(&mock_server)
        .get_post_by_slug(None, "a b")
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_delete_post_sends_bearer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/posts/4"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = blog(&mock_server).delete_post(Some("tok"), 4).await.unwrap();
    assert!(response.is_success());
}

fn verifier(server: &MockServer, secret: Option<&str>) -> RecaptchaVerifier {
    RecaptchaVerifier::with_endpoint(
        format!("{}/siteverify", server.uri()),
        secret.map(str::to_string),
        0.5,
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_recaptcha_thresholds_score() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("secret=s3cret"))
        .and(body_string_contains("response=good"))
        .and(body_string_contains("remoteip=203.0.113.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "score": 0.9 })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("response=bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "score": 0.1 })))
        .mount(&mock_server)
        .await;

    let verifier = verifier(&mock_server, Some("s3cret"));

    let outcome = verifier
        .verify("good", Some("203.0.113.9".parse().unwrap()))
        .await;
    assert!(outcome.valid);
    assert!((outcome.score - 0.9).abs() < f64::EPSILON);

    let outcome = verifier.verify("bot", None).await;
    assert!(!outcome.valid);
    assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn test_recaptcha_rejections() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("response=expired"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error-codes": ["timeout-or-duplicate"]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("response=garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("response=down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let verifier = verifier(&mock_server, Some("s3cret"));

    let outcome = verifier.verify("expired", None).await;
    assert_eq!(outcome.error.as_deref(), Some("timeout-or-duplicate"));

    let outcome = verifier.verify("garbled", None).await;
    assert_eq!(
        outcome.error.as_deref(),
        Some("Error al procesar la verificación de reCAPTCHA")
    );

    let outcome = verifier.verify("down", None).await;
    assert_eq!(
        outcome.error.as_deref(),
        Some("Error al conectar con el servicio de reCAPTCHA")
    );

    let outcome = verifier.verify("", None).await;
    assert_eq!(
        outcome.error.as_deref(),
        Some("Token de reCAPTCHA no proporcionado")
    );
}

#[tokio::test]
async fn test_recaptcha_without_secret_never_calls_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let verifier = verifier(&mock_server, Some(""));
    assert!(!verifier.is_configured());

    let outcome = verifier.verify("token", None).await;
    assert!(!outcome.valid);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Configuración de reCAPTCHA incompleta")
    );
}
