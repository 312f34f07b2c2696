use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{DocumentIdentity, TenantContext};
use shared_models::AppError;

use crate::models::{CreateAvailabilityRequest, CreateBlockedTimeRequest, UpdateAvailabilityRequest};
use crate::services::{AvailabilityService, SchedulingService};

#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
}

impl DoctorQuery {
    fn identity(&self) -> DocumentIdentity {
        DocumentIdentity::new(self.doctor_document_type_id, self.doctor_document_number.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    /// Civil date, YYYY-MM-DD.
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CheckAvailabilityQuery {
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
}

#[axum::debug_handler]
pub async fn create_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::bind(&config, &ctx)?;
    let window = service.create_availability(request).await?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn list_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::bind(&config, &ctx)?;
    let windows = service.list_availability(&query.identity()).await?;

    Ok(Json(json!({
        "availability": windows,
        "total": windows.len()
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Path(availability_id): Path<Uuid>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::bind(&config, &ctx)?;
    let window = service.update_availability(availability_id, request).await?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Path(availability_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::bind(&config, &ctx)?;
    service.delete_availability(availability_id).await?;

    Ok(Json(json!({ "message": "Availability deleted successfully" })))
}

#[axum::debug_handler]
pub async fn create_blocked_time(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreateBlockedTimeRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::bind(&config, &ctx)?;
    let blocked = service.create_blocked_time(request).await?;

    Ok(Json(json!(blocked)))
}

#[axum::debug_handler]
pub async fn list_blocked_times(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::bind(&config, &ctx)?;
    let blocked_times = service.list_blocked_times(&query.identity()).await?;

    Ok(Json(json!({
        "blocked_times": blocked_times,
        "total": blocked_times.len()
    })))
}

#[axum::debug_handler]
pub async fn delete_blocked_time(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Path(blocked_time_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::bind(&config, &ctx)?;
    service.delete_blocked_time(blocked_time_id).await?;

    Ok(Json(json!({ "message": "Blocked time deleted successfully" })))
}

#[axum::debug_handler]
pub async fn get_time_slots(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor = DocumentIdentity::new(query.doctor_document_type_id, query.doctor_document_number.clone());

    let service = SchedulingService::bind(&config, &ctx)?;
    let time_slots = service.get_time_slots(&doctor, query.date).await?;

    let available_slots = time_slots.iter().filter(|slot| slot.available).count();

    Ok(Json(json!({
        "doctor_document_type_id": doctor.document_type_id,
        "doctor_document_number": doctor.document_number,
        "date": query.date,
        "time_slots": time_slots,
        "total_slots": time_slots.len(),
        "available_slots": available_slots,
    })))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<CheckAvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    if query.end_datetime <= query.start_datetime {
        return Err(AppError::Validation(
            "start_datetime must be before end_datetime".to_string(),
        ));
    }

    let doctor = DocumentIdentity::new(query.doctor_document_type_id, query.doctor_document_number.clone());

    let service = SchedulingService::bind(&config, &ctx)?;
    let available = service
        .check_availability(&doctor, query.start_datetime, query.end_datetime)
        .await?;

    Ok(Json(json!({
        "available": available,
        "doctor_document_type_id": doctor.document_type_id,
        "doctor_document_number": doctor.document_number,
        "start_datetime": query.start_datetime,
        "end_datetime": query.end_datetime,
    })))
}
