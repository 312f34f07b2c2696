use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use auth_cell::services::CredentialService;
use shared_config::AppConfig;
use shared_database::{tables, AdminDb, DbError};
use shared_models::auth::TenantContext;
use shared_models::AppError;

use crate::models::{CreateTenantRequest, CreatedTenantResponse, Tenant, TenantError, UpdateTenantRequest};

/// Tenant administration. Only the master credential reaches this service,
/// and only the tenant and credential tables are reachable from it.
pub struct TenantService {
    db: AdminDb,
    credentials: CredentialService,
}

impl TenantService {
    pub fn for_master(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(Self {
            db: AdminDb::for_master(config, ctx)?,
            credentials: CredentialService::for_master(config, ctx)?,
        })
    }

    /// Create a tenant and issue its first credential in one operation. The
    /// plaintext key in the response is shown exactly once.
    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
    ) -> Result<CreatedTenantResponse, TenantError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(TenantError::Validation("name must not be empty".into()));
        }

        let existing = self
            .db
            .select_one(tables::TENANT, &[("name", format!("eq.{}", name))])
            .await?;
        if existing.is_some() {
            return Err(TenantError::Validation(format!(
                "name: tenant {} already exists",
                name
            )));
        }

        let row = self
            .db
            .insert(
                tables::TENANT,
                json!({
                    "name": name,
                    "is_active": true,
                    "created_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let tenant = parse_tenant(row)?;
        info!("Created tenant {} ({})", tenant.name, tenant.id);

        let (credential, plaintext_key) = self
            .credentials
            .issue(tenant.id, &format!("{} - Primary API Key", tenant.name))
            .await
            .map_err(|e| match e {
                auth_cell::models::AuthError::Database(db) => TenantError::Database(db),
                other => TenantError::Database(DbError::Invalid(format!(
                    "failed to issue the tenant's first credential: {}",
                    other
                ))),
            })?;

        Ok(CreatedTenantResponse {
            tenant,
            credential,
            plaintext_key,
        })
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, TenantError> {
        let rows = self
            .db
            .select(tables::TENANT, &[("order", "created_at.desc".to_string())])
            .await?;
        debug!("Listing {} tenants", rows.len());

        rows.into_iter().map(parse_tenant).collect()
    }

    pub async fn get_tenant(&self, tenant_id: Uuid) -> Result<Tenant, TenantError> {
        let row = self
            .db
            .select_one(tables::TENANT, &[("id", format!("eq.{}", tenant_id))])
            .await?;

        match row {
            Some(row) => parse_tenant(row),
            None => Err(TenantError::NotFound),
        }
    }

    /// Renames or (de)activates a tenant. Deactivation takes effect at the
    /// credential resolver on the next request.
    pub async fn update_tenant(
        &self,
        tenant_id: Uuid,
        request: UpdateTenantRequest,
    ) -> Result<Tenant, TenantError> {
        let mut update_data = Map::new();

        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(TenantError::Validation("name must not be empty".into()));
            }
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let rows = self
            .db
            .update(
                tables::TENANT,
                &[("id", format!("eq.{}", tenant_id))],
                Value::Object(update_data),
            )
            .await?;

        let row = rows.into_iter().next().ok_or(TenantError::NotFound)?;
        let tenant = parse_tenant(row)?;
        info!("Updated tenant {}", tenant_id);

        Ok(tenant)
    }

    pub async fn deactivate_tenant(&self, tenant_id: Uuid) -> Result<Tenant, TenantError> {
        self.update_tenant(
            tenant_id,
            UpdateTenantRequest {
                name: None,
                is_active: Some(false),
            },
        )
        .await
    }
}

fn parse_tenant(row: Value) -> Result<Tenant, TenantError> {
    serde_json::from_value(row)
        .map_err(|e| TenantError::Database(DbError::Invalid(format!("malformed tenant row: {}", e))))
}
