//! Status-code mapping of the Supabase REST client.

use assert_matches::assert_matches;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "anon-key".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        notification_webhook_url: String::new(),
        port: 0,
    }
}

async fn get(server: &MockServer) -> Result<Value, DbError> {
    let client = SupabaseClient::new(&config_for(server));
    client
        .request(reqwest::Method::GET, "/rest/v1/rows", Some("token"), None)
        .await
}

#[tokio::test]
async fn sends_api_key_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/rows"))
        .and(header("apikey", "anon-key"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    assert!(get(&server).await.is_ok());
}

#[tokio::test]
async fn maps_auth_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&server)
        .await;

    assert_matches!(get(&server).await, Err(DbError::Auth(_)));
}

#[tokio::test]
async fn maps_not_found_and_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    assert_matches!(get(&server).await, Err(DbError::NotFound));

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&server)
        .await;
    assert_matches!(get(&server).await, Err(DbError::Conflict));
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    assert_matches!(get(&server).await, Err(DbError::Transient(_)));
}

#[tokio::test]
async fn other_statuses_keep_their_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
        .mount(&server)
        .await;

    assert_matches!(get(&server).await, Err(DbError::Api { status: 422, .. }));
}
