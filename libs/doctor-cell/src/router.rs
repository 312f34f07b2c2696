use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use auth_cell::middleware::tenant_auth;
use shared_config::AppConfig;

use crate::handlers;

pub fn doctor_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/availability", post(handlers::create_availability))
        .route("/availability", get(handlers::list_availability))
        .route("/availability/{id}", patch(handlers::update_availability))
        .route("/availability/{id}", delete(handlers::delete_availability))
        .route("/blocked-times", post(handlers::create_blocked_time))
        .route("/blocked-times", get(handlers::list_blocked_times))
        .route("/blocked-times/{id}", delete(handlers::delete_blocked_time))
        .route("/slots", get(handlers::get_time_slots))
        .route("/slots/check", get(handlers::check_availability))
        .layer(middleware::from_fn_with_state(config.clone(), tenant_auth))
        .with_state(config)
}
