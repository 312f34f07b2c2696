use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub postgrest_url: String,
    pub postgrest_service_key: String,
    pub scope_token_secret: String,
    pub master_api_key: String,
    /// Offset of the clinic's civil time from UTC, in minutes.
    pub clinic_utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            postgrest_url: env::var("POSTGREST_URL")
                .unwrap_or_else(|_| {
                    warn!("POSTGREST_URL not set, using empty value");
                    String::new()
                }),
            postgrest_service_key: env::var("POSTGREST_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("POSTGREST_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            scope_token_secret: env::var("SCOPE_TOKEN_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SCOPE_TOKEN_SECRET not set, using empty value");
                    String::new()
                }),
            master_api_key: env::var("MASTER_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("MASTER_API_KEY not set, master operations disabled");
                    String::new()
                }),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.postgrest_url.is_empty()
            && !self.postgrest_service_key.is_empty()
            && !self.scope_token_secret.is_empty()
    }
}
