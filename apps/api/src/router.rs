use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::credential_admin_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use tenant_cell::router::tenant_admin_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/health", get(|| async { "Consulta API is running!" }))
        .nest("/v1/admin/tenants", tenant_admin_routes(state.clone()))
        .nest("/v1/admin/credentials", credential_admin_routes(state.clone()))
        .nest("/v1/patients", patient_routes(state.clone()))
        .nest("/v1/appointments", appointment_routes(state.clone()))
        .nest("/v1/doctors", doctor_routes(state.clone()))
}
