use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_database::DbError;
use shared_models::AppError;

/// A patient row. Identified within its tenant by the
/// (document_type_id, document_number) pair; appointments reference that
/// pair, not this row's id, so deleting a patient leaves history intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub second_name: Option<String>,
    pub first_last_name: String,
    pub second_last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender_id: Option<i32>,
    pub document_type_id: i32,
    pub document_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub eps_id: Option<String>,
    #[serde(default)]
    pub habeas_data: bool,
    #[serde(default)]
    pub custom_fields: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.first_name.as_str()];
        if let Some(second) = &self.second_name {
            parts.push(second);
        }
        parts.push(&self.first_last_name);
        if let Some(second_last) = &self.second_last_name {
            parts.push(second_last);
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub second_name: Option<String>,
    pub first_last_name: String,
    pub second_last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender_id: Option<i32>,
    pub document_type_id: i32,
    pub document_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub eps_id: Option<String>,
    #[serde(default)]
    pub habeas_data: bool,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub second_name: Option<String>,
    pub first_last_name: Option<String>,
    pub second_last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender_id: Option<i32>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub eps_id: Option<String>,
    pub habeas_data: Option<bool>,
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    pub document_type_id: Option<i32>,
    pub document_number: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("storage error during patient handling: {0}")]
    Database(#[from] DbError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::Validation(msg) => AppError::Validation(msg),
            PatientError::Database(db) => db.into(),
        }
    }
}
