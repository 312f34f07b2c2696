use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::TenantContext;
use shared_models::AppError;
use shared_utils::scope_token::mint_scope_token;

use crate::postgrest::{DbError, PostgrestClient};

pub mod tables {
    pub const TENANT: &str = "tenant";
    pub const API_CREDENTIAL: &str = "api_credential";
    pub const PATIENT: &str = "patient";
    pub const DOCTOR_AVAILABILITY: &str = "doctor_availability";
    pub const DOCTOR_BLOCKED_TIME: &str = "doctor_blocked_time";
    pub const APPOINTMENT: &str = "appointment";
}

/// Tables reachable without a tenant scope. Everything else is tenant data
/// and only exists behind a [`ScopedDb`].
const ADMIN_TABLES: [&str; 2] = [tables::TENANT, tables::API_CREDENTIAL];

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn ensure_admin_table(table: &str) -> Result<(), DbError> {
    if ADMIN_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(DbError::Isolation(format!(
            "table {} is not reachable with administrative scope",
            table
        )))
    }
}

fn build_path(tenant_id: Option<Uuid>, table: &str, filters: &[(&str, String)]) -> String {
    let mut path = format!("/rest/v1/{}", table);
    let mut separator = '?';

    if let Some(tenant_id) = tenant_id {
        path.push(separator);
        path.push_str(&format!("tenant_id=eq.{}", tenant_id));
        separator = '&';
    }

    for (key, value) in filters {
        path.push(separator);
        separator = '&';
        path.push_str(key);
        path.push('=');
        path.push_str(&urlencoding::encode(value));
    }

    path
}

fn inject_tenant(body: &mut Value, tenant_id: Uuid) -> Result<(), DbError> {
    let object = body
        .as_object_mut()
        .ok_or_else(|| DbError::Invalid("insert body must be a JSON object".into()))?;
    // Overwrites anything the caller put there; the bound tenant always wins.
    object.insert("tenant_id".to_string(), Value::String(tenant_id.to_string()));
    Ok(())
}

/// The only handle tenant-data services receive. Binding attaches the
/// resolved tenant to every operation for the lifetime of one request:
/// queries get a mandatory `tenant_id` filter, insert bodies get the bound
/// tenant injected, and every call rides a freshly minted scope token whose
/// claims the storage row-level-security policies enforce independently.
/// There is no unscoped method.
pub struct ScopedDb {
    client: PostgrestClient,
    tenant_id: Uuid,
    scope_token: String,
    inject_filters: bool,
}

impl ScopedDb {
    pub fn bind(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        let scope = ctx.tenant().ok_or_else(|| {
            AppError::IsolationViolation(
                "master scope cannot be bound to tenant data operations".into(),
            )
        })?;

        let scope_token = mint_scope_token(
            scope.tenant_id,
            scope.credential_id,
            &config.scope_token_secret,
        )
        .map_err(|e| AppError::IsolationViolation(format!("failed to mint scope token: {}", e)))?;

        debug!("Bound storage scope to tenant {}", scope.tenant_id);

        Ok(Self {
            client: PostgrestClient::new(config),
            tenant_id: scope.tenant_id,
            scope_token,
            inject_filters: true,
        })
    }

    /// Simulates the loss of the query-side tenant filter so tests can prove
    /// the scope token alone still pins the tenant at the storage boundary.
    #[cfg(test)]
    fn bind_without_query_filters(
        config: &AppConfig,
        ctx: &TenantContext,
    ) -> Result<Self, AppError> {
        let mut db = Self::bind(config, ctx)?;
        db.inject_filters = false;
        Ok(db)
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn path(&self, table: &str, filters: &[(&str, String)]) -> String {
        let tenant_filter = self.inject_filters.then_some(self.tenant_id);
        build_path(tenant_filter, table, filters)
    }

    pub async fn select(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Value>, DbError> {
        let path = self.path(table, filters);
        self.client
            .request(Method::GET, &path, &self.scope_token, None)
            .await
    }

    pub async fn select_one(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<Value>, DbError> {
        let mut filters = filters.to_vec();
        filters.push(("limit", "1".to_string()));
        let rows = self.select(table, &filters).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert(&self, table: &str, mut body: Value) -> Result<Value, DbError> {
        inject_tenant(&mut body, self.tenant_id)?;

        let path = self.path(table, &[]);
        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                &path,
                &self.scope_token,
                Some(body),
                Some(representation_headers()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::Invalid(format!("insert into {} returned no representation", table)))
    }

    pub async fn update(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: Value,
    ) -> Result<Vec<Value>, DbError> {
        if filters.is_empty() {
            return Err(DbError::Invalid(format!(
                "refusing to update {} without row filters",
                table
            )));
        }

        let path = self.path(table, filters);
        self.client
            .request_with_headers(
                Method::PATCH,
                &path,
                &self.scope_token,
                Some(body),
                Some(representation_headers()),
            )
            .await
    }

    pub async fn delete(&self, table: &str, filters: &[(&str, String)]) -> Result<(), DbError> {
        if filters.is_empty() {
            return Err(DbError::Invalid(format!(
                "refusing to delete from {} without row filters",
                table
            )));
        }

        let path = self.path(table, filters);
        self.client
            .execute(Method::DELETE, &path, &self.scope_token, None)
            .await
    }
}

/// Storage handle for tenant and credential administration. Reachable tables
/// are whitelisted; asking it for tenant data is an isolation violation, not
/// a fallback path.
#[derive(Clone)]
pub struct AdminDb {
    client: PostgrestClient,
    bearer: String,
}

impl AdminDb {
    pub fn for_master(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        if !ctx.is_master() {
            return Err(AppError::Auth(
                "administrative operations require the master credential".into(),
            ));
        }
        Ok(Self::with_service_role(config))
    }

    /// The credential resolver runs before any scope exists, so it gets the
    /// same whitelisted handle without a context check.
    pub fn for_credential_lookup(config: &AppConfig) -> Self {
        Self::with_service_role(config)
    }

    fn with_service_role(config: &AppConfig) -> Self {
        let client = PostgrestClient::new(config);
        let bearer = client.service_key().to_string();
        Self { client, bearer }
    }

    pub async fn select(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Value>, DbError> {
        ensure_admin_table(table)?;
        let path = build_path(None, table, filters);
        self.client
            .request(Method::GET, &path, &self.bearer, None)
            .await
    }

    pub async fn select_one(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<Value>, DbError> {
        let mut filters = filters.to_vec();
        filters.push(("limit", "1".to_string()));
        let rows = self.select(table, &filters).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert(&self, table: &str, body: Value) -> Result<Value, DbError> {
        ensure_admin_table(table)?;
        let path = build_path(None, table, &[]);
        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                &path,
                &self.bearer,
                Some(body),
                Some(representation_headers()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::Invalid(format!("insert into {} returned no representation", table)))
    }

    pub async fn update(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: Value,
    ) -> Result<Vec<Value>, DbError> {
        ensure_admin_table(table)?;
        if filters.is_empty() {
            return Err(DbError::Invalid(format!(
                "refusing to update {} without row filters",
                table
            )));
        }

        let path = build_path(None, table, filters);
        self.client
            .request_with_headers(
                Method::PATCH,
                &path,
                &self.bearer,
                Some(body),
                Some(representation_headers()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_utils::scope_token::validate_scope_token;
    use shared_utils::test_utils::{tenant_context, TestConfig};
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn scoped_path_always_carries_the_tenant_filter() {
        let tenant_id = Uuid::new_v4();
        let path = build_path(
            Some(tenant_id),
            tables::APPOINTMENT,
            &[("state", "eq.scheduled".to_string())],
        );

        assert!(path.starts_with("/rest/v1/appointment?"));
        assert!(path.contains(&format!("tenant_id=eq.{}", tenant_id)));
        assert!(path.contains("state=eq.scheduled"));
    }

    #[test]
    fn filter_values_are_url_encoded() {
        let path = build_path(
            None,
            tables::APPOINTMENT,
            &[("start_utc", "lt.2025-09-25T10:00:00+00:00".to_string())],
        );
        assert!(path.contains("start_utc=lt.2025-09-25T10%3A00%3A00%2B00%3A00"));
    }

    #[test]
    fn insert_body_cannot_smuggle_a_foreign_tenant() {
        let bound_tenant = Uuid::new_v4();
        let foreign_tenant = Uuid::new_v4();
        let mut body = json!({
            "first_name": "Ana",
            "tenant_id": foreign_tenant.to_string(),
        });

        inject_tenant(&mut body, bound_tenant).unwrap();
        assert_eq!(body["tenant_id"], json!(bound_tenant.to_string()));
    }

    #[test]
    fn non_object_insert_body_is_rejected() {
        let mut body = json!(["not", "an", "object"]);
        assert!(inject_tenant(&mut body, Uuid::new_v4()).is_err());
    }

    #[test]
    fn admin_scope_cannot_reach_tenant_data_tables() {
        assert!(ensure_admin_table(tables::TENANT).is_ok());
        assert!(ensure_admin_table(tables::API_CREDENTIAL).is_ok());

        for table in [
            tables::PATIENT,
            tables::APPOINTMENT,
            tables::DOCTOR_AVAILABILITY,
            tables::DOCTOR_BLOCKED_TIME,
        ] {
            match ensure_admin_table(table) {
                Err(DbError::Isolation(_)) => {}
                other => panic!("expected isolation error for {}, got {:?}", table, other),
            }
        }
    }

    #[test]
    fn master_context_cannot_bind_a_tenant_scope() {
        let config = TestConfig::default().to_app_config();
        match ScopedDb::bind(&config, &TenantContext::Master) {
            Err(AppError::IsolationViolation(_)) => {}
            other => panic!("expected isolation violation, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn every_scoped_read_is_filtered_and_carries_the_scope_token() {
        let server = MockServer::start().await;
        let tenant_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/patient"))
            .and(query_param("tenant_id", format!("eq.{}", tenant_id)))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
        let db = ScopedDb::bind(&config, &tenant_context(tenant_id)).unwrap();

        let rows = db.select(tables::PATIENT, &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn scope_token_pins_the_tenant_even_with_query_filters_disabled() {
        let server = MockServer::start().await;
        let tenant_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/patient"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let test_config = TestConfig::with_postgrest_url(&server.uri());
        let secret = test_config.scope_token_secret.clone();
        let config = test_config.to_app_config();

        let db = ScopedDb::bind_without_query_filters(&config, &tenant_context(tenant_id)).unwrap();
        db.select(tables::PATIENT, &[]).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let request = &requests[0];

        // Secondary guarantee deliberately off: no tenant filter on the wire.
        assert!(!request.url.query().unwrap_or("").contains("tenant_id"));

        // Primary guarantee still holds: the bearer claims pin the tenant for
        // the storage policies.
        let bearer = request.headers.get("Authorization").unwrap().to_str().unwrap();
        let token = bearer.strip_prefix("Bearer ").unwrap();
        let claims = validate_scope_token(token, &secret).unwrap();
        assert_eq!(claims.tenant_id, tenant_id.to_string());
    }

    #[tokio::test]
    async fn storage_conflict_is_surfaced_as_a_typed_error() {
        let server = MockServer::start().await;
        let tenant_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/rest/v1/appointment"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23P01",
                "message": "conflicting key value violates exclusion constraint"
            })))
            .mount(&server)
            .await;

        let config = TestConfig::with_postgrest_url(&server.uri()).to_app_config();
        let db = ScopedDb::bind(&config, &tenant_context(tenant_id)).unwrap();

        let result = db
            .insert(tables::APPOINTMENT, json!({"modality": "in-person"}))
            .await;
        match result {
            Err(DbError::Conflict(_)) => {}
            other => panic!("expected conflict, got {:?}", other),
        }
    }
}
