use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::TenantContext;
use shared_models::AppError;

use crate::models::{CredentialListQuery, IssueCredentialRequest, IssuedCredentialResponse};
use crate::services::CredentialService;

#[axum::debug_handler]
pub async fn issue_credential(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<IssueCredentialRequest>,
) -> Result<Json<IssuedCredentialResponse>, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }

    let service = CredentialService::for_master(&config, &ctx)?;
    let (credential, plaintext_key) = service.issue(request.tenant_id, &request.name).await?;

    Ok(Json(IssuedCredentialResponse {
        credential,
        plaintext_key,
    }))
}

#[axum::debug_handler]
pub async fn list_credentials(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<CredentialListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = CredentialService::for_master(&config, &ctx)?;
    let credentials = service.list(query.tenant_id).await?;

    Ok(Json(json!({
        "credentials": credentials,
        "total": credentials.len()
    })))
}

#[axum::debug_handler]
pub async fn revoke_credential(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Path(credential_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = CredentialService::for_master(&config, &ctx)?;
    let credential = service.revoke(credential_id).await?;

    Ok(Json(json!(credential)))
}
