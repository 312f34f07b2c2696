use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{tables, AdminDb, DbError};
use shared_models::auth::TenantContext;
use shared_models::AppError;
use uuid::Uuid;

use crate::models::{AuthError, Credential};

/// Deterministic one-way digest of a presented secret. Lookups go through
/// this; the plaintext is never stored.
pub fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("{:x}", digest)
}

pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Credential administration, master scope only.
pub struct CredentialService {
    db: AdminDb,
}

impl CredentialService {
    pub fn for_master(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(Self {
            db: AdminDb::for_master(config, ctx)?,
        })
    }

    /// Create a credential for a tenant. The plaintext secret in the return
    /// value is shown exactly once and cannot be recovered afterwards.
    pub async fn issue(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<(Credential, String), AuthError> {
        let tenant = self
            .db
            .select_one(tables::TENANT, &[("id", format!("eq.{}", tenant_id))])
            .await?;
        if tenant.is_none() {
            return Err(AuthError::NotFound);
        }

        let plaintext = generate_secret();
        let key_hash = hash_secret(&plaintext);

        let row = self
            .db
            .insert(
                tables::API_CREDENTIAL,
                json!({
                    "tenant_id": tenant_id,
                    "key_hash": key_hash,
                    "name": name,
                    "created_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let credential: Credential = serde_json::from_value(row)
            .map_err(|e| DbError::Invalid(format!("malformed credential row: {}", e)))?;

        info!("Issued credential {} for tenant {}", credential.id, tenant_id);

        Ok((credential, plaintext))
    }

    pub async fn list(&self, tenant_id: Option<Uuid>) -> Result<Vec<Credential>, AuthError> {
        let mut filters = vec![("order", "created_at.desc".to_string())];
        if let Some(tenant_id) = tenant_id {
            filters.push(("tenant_id", format!("eq.{}", tenant_id)));
        }

        let rows = self.db.select(tables::API_CREDENTIAL, &filters).await?;
        debug!("Listing {} credentials", rows.len());

        let credentials = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Credential>, _>>()
            .map_err(|e| DbError::Invalid(format!("malformed credential row: {}", e)))?;

        Ok(credentials)
    }

    /// Revocation is a timestamp flip; the next resolve of this credential
    /// fails.
    pub async fn revoke(&self, credential_id: Uuid) -> Result<Credential, AuthError> {
        let rows = self
            .db
            .update(
                tables::API_CREDENTIAL,
                &[("id", format!("eq.{}", credential_id))],
                json!({
                    "revoked_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let row = rows.into_iter().next().ok_or(AuthError::NotFound)?;
        let credential: Credential = serde_json::from_value(row)
            .map_err(|e| DbError::Invalid(format!("malformed credential row: {}", e)))?;

        info!("Revoked credential {}", credential_id);

        Ok(credential)
    }
}
