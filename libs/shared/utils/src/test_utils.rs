use std::sync::Arc;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{TenantContext, TenantScope};

pub struct TestConfig {
    pub postgrest_url: String,
    pub postgrest_service_key: String,
    pub scope_token_secret: String,
    pub master_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            postgrest_url: "http://localhost:54321".to_string(),
            postgrest_service_key: "test-service-key".to_string(),
            scope_token_secret: "test-scope-secret-long-enough-for-hmac".to_string(),
            master_api_key: "test-master-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_postgrest_url(url: &str) -> Self {
        Self {
            postgrest_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            postgrest_url: self.postgrest_url.clone(),
            postgrest_service_key: self.postgrest_service_key.clone(),
            scope_token_secret: self.scope_token_secret.clone(),
            master_api_key: self.master_api_key.clone(),
            clinic_utc_offset_minutes: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub fn tenant_context(tenant_id: Uuid) -> TenantContext {
    TenantContext::Tenant(TenantScope {
        tenant_id,
        tenant_name: "Test Clinic".to_string(),
        credential_id: Uuid::new_v4(),
    })
}
