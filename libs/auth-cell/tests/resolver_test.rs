use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::models::AuthError;
use auth_cell::services::credential::hash_secret;
use auth_cell::services::CredentialResolver;
use shared_models::auth::TenantContext;
use shared_utils::test_utils::TestConfig;

fn credential_row(id: Uuid, tenant_id: Uuid, revoked: bool) -> serde_json::Value {
    json!({
        "id": id,
        "tenant_id": tenant_id,
        "name": "Integration key",
        "last_used_at": null,
        "revoked_at": if revoked { json!(Utc::now().to_rfc3339()) } else { json!(null) },
        "created_at": Utc::now().to_rfc3339(),
    })
}

fn tenant_row(id: Uuid, active: bool) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Clinica Andina",
        "is_active": active,
        "created_at": Utc::now().to_rfc3339(),
    })
}

async fn mount_credential_lookup(
    server: &MockServer,
    secret: &str,
    row: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/api_credential"))
        .and(query_param("key_hash", format!("eq.{}", hash_secret(secret))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

async fn mount_last_used_patch(server: &MockServer, status: u16) {
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/api_credential"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn valid_credential_resolves_to_its_tenant() {
    let server = MockServer::start().await;
    let credential_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let secret = "tenant-a-secret";

    mount_credential_lookup(&server, secret, credential_row(credential_id, tenant_id, false)).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tenant"))
        .and(query_param("id", format!("eq.{}", tenant_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([tenant_row(tenant_id, true)])))
        .mount(&server)
        .await;
    mount_last_used_patch(&server, 200).await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let resolver = CredentialResolver::new(&config);

    let ctx = resolver.resolve(secret).await.unwrap();
    let scope = ctx.tenant().expect("expected tenant scope");
    assert_eq!(scope.tenant_id, tenant_id);
    assert_eq!(scope.credential_id, credential_id);
    assert_eq!(scope.tenant_name, "Clinica Andina");
}

#[tokio::test]
async fn revoked_credential_is_rejected() {
    let server = MockServer::start().await;
    let secret = "revoked-secret";

    mount_credential_lookup(
        &server,
        secret,
        credential_row(Uuid::new_v4(), Uuid::new_v4(), true),
    )
    .await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let resolver = CredentialResolver::new(&config);

    match resolver.resolve(secret).await {
        Err(AuthError::InvalidCredential) => {}
        other => panic!("expected invalid credential, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn credential_of_inactive_tenant_is_rejected() {
    let server = MockServer::start().await;
    let tenant_id = Uuid::new_v4();
    let secret = "dormant-tenant-secret";

    mount_credential_lookup(
        &server,
        secret,
        credential_row(Uuid::new_v4(), tenant_id, false),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tenant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([tenant_row(tenant_id, false)])))
        .mount(&server)
        .await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let resolver = CredentialResolver::new(&config);

    match resolver.resolve(secret).await {
        Err(AuthError::InvalidCredential) => {}
        other => panic!("expected invalid credential, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn unknown_secret_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/api_credential"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let resolver = CredentialResolver::new(&config);

    match resolver.resolve("nobody-knows-this").await {
        Err(AuthError::InvalidCredential) => {}
        other => panic!("expected invalid credential, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn empty_secret_is_rejected_without_a_lookup() {
    let server = MockServer::start().await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let resolver = CredentialResolver::new(&config);

    match resolver.resolve("").await {
        Err(AuthError::MissingCredential) => {}
        other => panic!("expected missing credential, got {:?}", other.map(|_| ())),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn master_secret_resolves_to_administrative_scope() {
    let server = MockServer::start().await;

    let test_config = TestConfig::with_postgrest_url(&server.uri());
    let master_key = test_config.master_api_key.clone();
    let config = test_config.to_app_config();
    let resolver = CredentialResolver::new(&config);

    let ctx = resolver.resolve(&master_key).await.unwrap();
    assert!(matches!(ctx, TenantContext::Master));
    // Master is a configured literal; no storage lookup happens.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_last_used_bookkeeping_does_not_fail_resolution() {
    let server = MockServer::start().await;
    let tenant_id = Uuid::new_v4();
    let secret = "tenant-b-secret";

    mount_credential_lookup(
        &server,
        secret,
        credential_row(Uuid::new_v4(), tenant_id, false),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tenant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([tenant_row(tenant_id, true)])))
        .mount(&server)
        .await;
    mount_last_used_patch(&server, 500).await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let resolver = CredentialResolver::new(&config);

    let ctx = resolver.resolve(secret).await.unwrap();
    assert!(ctx.tenant().is_some());
}
