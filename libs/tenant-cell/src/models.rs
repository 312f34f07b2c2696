use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use auth_cell::models::Credential;
use shared_database::DbError;
use shared_models::AppError;

/// An isolated customer organization. Never deleted in normal operation;
/// deactivation flips `is_active`, which invalidates all its credentials at
/// the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

/// Returned from tenant creation: the one moment the first credential's
/// plaintext is visible.
#[derive(Debug, Serialize)]
pub struct CreatedTenantResponse {
    pub tenant: Tenant,
    pub credential: Credential,
    pub plaintext_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("storage error during tenant handling: {0}")]
    Database(#[from] DbError),
}

impl From<TenantError> for AppError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound => AppError::NotFound(err.to_string()),
            TenantError::Validation(msg) => AppError::Validation(msg),
            TenantError::Database(db) => db.into(),
        }
    }
}
