use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolved identity of one request, produced by the credential resolver and
/// carried as an explicit value through every layer. Never stored globally.
#[derive(Debug, Clone)]
pub enum TenantContext {
    Tenant(TenantScope),
    /// Configured master credential. Valid only for tenant and credential
    /// administration; the data-path scope binding rejects it.
    Master,
}

#[derive(Debug, Clone)]
pub struct TenantScope {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub credential_id: Uuid,
}

impl TenantContext {
    pub fn tenant(&self) -> Option<&TenantScope> {
        match self {
            TenantContext::Tenant(scope) => Some(scope),
            TenantContext::Master => None,
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, TenantContext::Master)
    }
}

/// Claims of the per-request scope token handed to the storage layer. The
/// row-level-security policies read `tenant_id` from these claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScopeClaims {
    pub sub: String,
    pub tenant_id: String,
    pub role: String,
    pub iat: u64,
    pub exp: u64,
}

/// A practitioner or patient as referenced by scheduling data: the
/// (document type, document number) pair scoped to a tenant. Not a stored
/// profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentIdentity {
    pub document_type_id: i32,
    pub document_number: String,
}

impl DocumentIdentity {
    pub fn new(document_type_id: i32, document_number: impl Into<String>) -> Self {
        Self {
            document_type_id,
            document_number: document_number.into(),
        }
    }
}
