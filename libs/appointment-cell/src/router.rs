use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use auth_cell::middleware::tenant_auth;
use shared_config::AppConfig;

use crate::handlers::*;

pub fn appointment_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(create_appointment))
        .route("/search", get(search_appointments))
        .route("/{id}", get(get_appointment))
        .route("/{id}", put(update_appointment))
        .route("/{id}", delete(delete_appointment))
        .layer(middleware::from_fn_with_state(config.clone(), tenant_auth))
        .with_state(config)
}
