use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_models::auth::TenantContext;
use shared_models::AppError;
use shared_utils::test_utils::{tenant_context, TestConfig};
use tenant_cell::models::{CreateTenantRequest, TenantError, UpdateTenantRequest};
use tenant_cell::services::TenantService;

fn tenant_row(id: Uuid, name: &str, active: bool) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "is_active": active,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

fn credential_row(tenant_id: Uuid, name: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "tenant_id": tenant_id,
        "name": name,
        "last_used_at": null,
        "revoked_at": null,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

#[tokio::test]
async fn creating_a_tenant_issues_its_first_credential_once() {
    let server = MockServer::start().await;
    let tenant_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/tenant"))
        .and(query_param("name", "eq.Clinica Andina"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/tenant"))
        .and(body_partial_json(json!({ "name": "Clinica Andina", "is_active": true })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([tenant_row(tenant_id, "Clinica Andina", true)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Credential issuing re-checks the tenant, then stores only the hash.
    Mock::given(method("GET"))
        .and(path("/rest/v1/tenant"))
        .and(query_param("id", format!("eq.{}", tenant_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([tenant_row(tenant_id, "Clinica Andina", true)])),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/api_credential"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([credential_row(
                tenant_id,
                "Clinica Andina - Primary API Key"
            )])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let service = TenantService::for_master(&config, &TenantContext::Master).unwrap();

    let created = service
        .create_tenant(CreateTenantRequest {
            name: "Clinica Andina".into(),
        })
        .await
        .unwrap();

    assert_eq!(created.tenant.id, tenant_id);
    assert_eq!(created.credential.tenant_id, tenant_id);
    assert!(!created.plaintext_key.is_empty());

    // The plaintext never reaches storage.
    for request in server.received_requests().await.unwrap() {
        let body = String::from_utf8_lossy(&request.body).to_string();
        assert!(!body.contains(&created.plaintext_key));
    }
}

#[tokio::test]
async fn duplicate_tenant_name_is_a_validation_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tenant"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([tenant_row(Uuid::new_v4(), "Clinica Andina", true)])),
        )
        .mount(&server)
        .await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let service = TenantService::for_master(&config, &TenantContext::Master).unwrap();

    match service
        .create_tenant(CreateTenantRequest {
            name: "Clinica Andina".into(),
        })
        .await
    {
        Err(TenantError::Validation(msg)) => assert!(msg.contains("name")),
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn a_tenant_scope_cannot_reach_tenant_administration() {
    let config = TestConfig::default().to_app_config();

    match TenantService::for_master(&config, &tenant_context(Uuid::new_v4())) {
        Err(AppError::Auth(_)) => {}
        other => panic!("expected auth error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn deactivation_flips_the_active_flag() {
    let server = MockServer::start().await;
    let tenant_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tenant"))
        .and(query_param("id", format!("eq.{}", tenant_id)))
        .and(body_partial_json(json!({ "is_active": false })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([tenant_row(tenant_id, "Clinica Andina", false)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let service = TenantService::for_master(&config, &TenantContext::Master).unwrap();

    let tenant = service.deactivate_tenant(tenant_id).await.unwrap();
    assert!(!tenant.is_active);
}

#[tokio::test]
async fn updating_a_missing_tenant_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tenant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
    let service = TenantService::for_master(&config, &TenantContext::Master).unwrap();

    match service
        .update_tenant(Uuid::new_v4(), UpdateTenantRequest::default())
        .await
    {
        Err(TenantError::NotFound) => {}
        other => panic!("expected not found, got {:?}", other.map(|_| ())),
    }
}
