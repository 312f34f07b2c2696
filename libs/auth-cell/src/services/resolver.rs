use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{tables, AdminDb, DbError};
use shared_models::auth::{TenantContext, TenantScope};

use crate::models::{AuthError, Credential};
use crate::services::credential::hash_secret;

/// Maps a presented API secret to a tenant identity. Leaf dependency of the
/// whole request pipeline: nothing tenant-scoped runs before this succeeds.
pub struct CredentialResolver {
    db: AdminDb,
    master_api_key: String,
}

impl CredentialResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: AdminDb::for_credential_lookup(config),
            master_api_key: config.master_api_key.clone(),
        }
    }

    pub async fn resolve(&self, presented: &str) -> Result<TenantContext, AuthError> {
        if presented.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        // The master credential is a configured literal, not a stored row.
        // It resolves to administrative scope only.
        if !self.master_api_key.is_empty() && presented == self.master_api_key {
            info!("Master credential used for request");
            return Ok(TenantContext::Master);
        }

        let key_hash = hash_secret(presented);
        let row = self
            .db
            .select_one(
                tables::API_CREDENTIAL,
                &[("key_hash", format!("eq.{}", key_hash))],
            )
            .await?;

        let Some(row) = row else {
            let prefix: String = presented.chars().take(8).collect();
            warn!("Unknown API key presented: {}...", prefix);
            return Err(AuthError::InvalidCredential);
        };

        let credential: Credential = serde_json::from_value(row)
            .map_err(|e| DbError::Invalid(format!("malformed credential row: {}", e)))?;

        if credential.is_revoked() {
            warn!("Revoked credential {} presented", credential.id);
            return Err(AuthError::InvalidCredential);
        }

        let tenant_row = self
            .db
            .select_one(
                tables::TENANT,
                &[("id", format!("eq.{}", credential.tenant_id))],
            )
            .await?;

        let Some(tenant_row) = tenant_row else {
            warn!("Credential {} references a missing tenant", credential.id);
            return Err(AuthError::InvalidCredential);
        };

        if !tenant_row["is_active"].as_bool().unwrap_or(false) {
            warn!(
                "Credential {} belongs to inactive tenant {}",
                credential.id, credential.tenant_id
            );
            return Err(AuthError::InvalidCredential);
        }

        let tenant_name = tenant_row["name"].as_str().unwrap_or_default().to_string();

        self.record_last_use(credential.id);

        Ok(TenantContext::Tenant(TenantScope {
            tenant_id: credential.tenant_id,
            tenant_name,
            credential_id: credential.id,
        }))
    }

    /// Best-effort bookkeeping; a failure here must never fail the request.
    fn record_last_use(&self, credential_id: uuid::Uuid) {
        let db = self.db.clone();
        tokio::spawn(async move {
            let body = json!({ "last_used_at": Utc::now().to_rfc3339() });
            if let Err(e) = db
                .update(
                    tables::API_CREDENTIAL,
                    &[("id", format!("eq.{}", credential_id))],
                    body,
                )
                .await
            {
                debug!("Failed to record credential last use: {}", e);
            }
        });
    }
}
