use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers::*;
use crate::middleware::master_auth;

pub fn credential_admin_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(issue_credential))
        .route("/", get(list_credentials))
        .route("/{id}", delete(revoke_credential))
        .layer(middleware::from_fn_with_state(config.clone(), master_auth))
        .with_state(config)
}
