use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::TenantContext;
use shared_models::AppError;

use crate::services::CredentialResolver;

const API_KEY_HEADER: &str = "X-Api-Key";

fn presented_secret(request: &Request<Body>) -> &str {
    request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Guards every tenant-data route. Resolves the presented credential, rejects
/// master scope, and attaches the tenant context to the request before any
/// handler or persistence call runs.
pub async fn tenant_auth(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let resolver = CredentialResolver::new(&config);
    let ctx = resolver.resolve(presented_secret(&request)).await?;

    if ctx.is_master() {
        return Err(AppError::Auth(
            "master credential is not valid for tenant data operations".to_string(),
        ));
    }

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Guards the administrative routes; only the configured master credential
/// passes.
pub async fn master_auth(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let resolver = CredentialResolver::new(&config);
    let ctx = resolver.resolve(presented_secret(&request)).await?;

    if !ctx.is_master() {
        return Err(AppError::Auth(
            "administrative operations require the master credential".to_string(),
        ));
    }

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Fetch the context placed by the middleware; its absence means a route was
/// wired without an auth layer, which is a hard failure, not a fallback.
pub fn extract_tenant<B>(request: &Request<B>) -> Result<TenantContext, AppError> {
    request
        .extensions()
        .get::<TenantContext>()
        .cloned()
        .ok_or_else(|| {
            AppError::IsolationViolation("request reached a handler without a bound tenant context".to_string())
        })
}
