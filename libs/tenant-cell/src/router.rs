use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use auth_cell::middleware::master_auth;
use shared_config::AppConfig;

use crate::handlers::*;

pub fn tenant_admin_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(create_tenant))
        .route("/", get(list_tenants))
        .route("/{id}", get(get_tenant))
        .route("/{id}", patch(update_tenant))
        .layer(middleware::from_fn_with_state(config.clone(), master_auth))
        .with_state(config)
}
