use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::TenantContext;
use shared_models::AppError;

use crate::models::{CreateTenantRequest, UpdateTenantRequest};
use crate::services::TenantService;

#[axum::debug_handler]
pub async fn create_tenant(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreateTenantRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TenantService::for_master(&config, &ctx)?;
    let created = service.create_tenant(request).await?;

    Ok(Json(json!(created)))
}

#[axum::debug_handler]
pub async fn list_tenants(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Value>, AppError> {
    let service = TenantService::for_master(&config, &ctx)?;
    let tenants = service.list_tenants().await?;

    Ok(Json(json!({
        "tenants": tenants,
        "total": tenants.len()
    })))
}

#[axum::debug_handler]
pub async fn get_tenant(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = TenantService::for_master(&config, &ctx)?;
    let tenant = service.get_tenant(tenant_id).await?;

    Ok(Json(json!(tenant)))
}

#[axum::debug_handler]
pub async fn update_tenant(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<UpdateTenantRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TenantService::for_master(&config, &ctx)?;
    let tenant = service.update_tenant(tenant_id, request).await?;

    Ok(Json(json!(tenant)))
}
