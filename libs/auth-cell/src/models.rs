use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::AppError;

/// A stored API credential. The secret itself is never stored or returned;
/// only its digest lives in the `key_hash` column, which this view omits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCredentialRequest {
    pub tenant_id: Uuid,
    pub name: String,
}

/// The only moment the plaintext secret is visible.
#[derive(Debug, Serialize)]
pub struct IssuedCredentialResponse {
    pub credential: Credential,
    pub plaintext_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialListQuery {
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("API key required. Provide X-Api-Key header.")]
    MissingCredential,

    #[error("Invalid API key")]
    InvalidCredential,

    #[error("Credential not found")]
    NotFound,

    #[error("storage error during credential handling: {0}")]
    Database(#[from] DbError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential | AuthError::InvalidCredential => {
                AppError::Auth(err.to_string())
            }
            AuthError::NotFound => AppError::NotFound(err.to_string()),
            AuthError::Database(db) => db.into(),
        }
    }
}
