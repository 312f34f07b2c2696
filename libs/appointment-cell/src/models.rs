use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_database::DbError;
use shared_models::auth::DocumentIdentity;
use shared_models::AppError;

/// State value that releases an appointment's hold on the calendar.
pub const STATE_CANCELLED: &str = "cancelled";

/// An appointment occupies its doctor's calendar for [start_utc, end_utc).
/// Patient and doctor are referenced by document identity, not by row id, so
/// the record outlives patient deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub patient_document_type_id: i32,
    pub patient_document_number: String,
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    pub modality: String,
    pub state: String,
    pub notification_state: Option<String>,
    pub appointment_type: Option<String>,
    pub clinic_id: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub custom_fields: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn doctor_identity(&self) -> DocumentIdentity {
        DocumentIdentity::new(self.doctor_document_type_id, self.doctor_document_number.clone())
    }

    pub fn occupies_calendar(&self) -> bool {
        self.state != STATE_CANCELLED
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub patient_document_type_id: i32,
    pub patient_document_number: String,
    pub doctor_document_type_id: i32,
    pub doctor_document_number: String,
    pub modality: String,
    pub state: Option<String>,
    pub appointment_type: Option<String>,
    pub clinic_id: Option<String>,
    pub comment: Option<String>,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub modality: Option<String>,
    pub state: Option<String>,
    pub notification_state: Option<String>,
    pub appointment_type: Option<String>,
    pub clinic_id: Option<String>,
    pub comment: Option<String>,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub modality: Option<String>,
    pub state: Option<String>,
    pub patient_document_number: Option<String>,
    pub doctor_document_number: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduling conflict: {0}")]
    Conflict(String),

    #[error("storage error during appointment handling: {0}")]
    Database(#[from] DbError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::Validation(msg) => AppError::Validation(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::Database(db) => db.into(),
        }
    }
}
