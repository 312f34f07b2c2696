use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_database::DbError;
use shared_models::AppError;

/// A recurring weekly work window for one doctor. Day of week is
/// Monday-based (0 = Monday .. 6 = Sunday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub appointment_duration_minutes: i32,
    pub is_active: bool,
    #[serde(default)]
    pub custom_fields: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A one-off interval during which the doctor is unschedulable regardless of
/// the weekly windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTime {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub reason: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub custom_fields: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One candidate slot offered to callers. Booked or blocked slots are still
/// emitted, flagged unavailable, so clients can render a full day grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub appointment_duration_minutes: i32,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub day_of_week: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub appointment_duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlockedTimeRequest {
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub reason: Option<String>,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Availability not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("storage error during availability handling: {0}")]
    Database(#[from] DbError),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::NotFound => AppError::NotFound(err.to_string()),
            AvailabilityError::Validation(msg) => AppError::Validation(msg),
            AvailabilityError::Database(db) => db.into(),
        }
    }
}
