use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{tables, DbError, ScopedDb};
use shared_models::auth::{DocumentIdentity, TenantContext};
use shared_models::AppError;

use crate::models::{
    AvailabilityError, AvailabilityWindow, BlockedTime, CreateAvailabilityRequest,
    CreateBlockedTimeRequest, UpdateAvailabilityRequest,
};

/// Calendar administration for one tenant: weekly windows and one-off
/// blocked intervals, all through the request's bound scope.
pub struct AvailabilityService {
    db: ScopedDb,
}

impl AvailabilityService {
    pub fn bind(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(Self {
            db: ScopedDb::bind(config, ctx)?,
        })
    }

    pub async fn create_availability(
        &self,
        request: CreateAvailabilityRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        if !(0..=6).contains(&request.day_of_week) {
            return Err(AvailabilityError::Validation(
                "day_of_week must be between 0 (Monday) and 6 (Sunday)".into(),
            ));
        }
        if request.start_time >= request.end_time {
            return Err(AvailabilityError::Validation(
                "start_time must be before end_time".into(),
            ));
        }
        if request.appointment_duration_minutes < 1 {
            return Err(AvailabilityError::Validation(
                "appointment_duration_minutes must be at least 1".into(),
            ));
        }
        if request.doctor_document_number.trim().is_empty() {
            return Err(AvailabilityError::Validation(
                "doctor_document_number must not be empty".into(),
            ));
        }

        debug!(
            "Creating availability for doctor {} on day {}",
            request.doctor_document_number, request.day_of_week
        );

        let row = self
            .db
            .insert(
                tables::DOCTOR_AVAILABILITY,
                json!({
                    "doctor_document_type_id": request.doctor_document_type_id,
                    "doctor_document_number": request.doctor_document_number,
                    "day_of_week": request.day_of_week,
                    "start_time": request.start_time.format("%H:%M:%S").to_string(),
                    "end_time": request.end_time.format("%H:%M:%S").to_string(),
                    "appointment_duration_minutes": request.appointment_duration_minutes,
                    "is_active": true,
                    "custom_fields": request.custom_fields.unwrap_or_else(|| json!({})),
                    "created_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let window = parse_window(row)?;
        info!("Created availability {} for doctor {}", window.id, window.doctor_document_number);

        Ok(window)
    }

    pub async fn list_availability(
        &self,
        doctor: &DocumentIdentity,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let rows = self
            .db
            .select(
                tables::DOCTOR_AVAILABILITY,
                &[
                    ("doctor_document_type_id", format!("eq.{}", doctor.document_type_id)),
                    ("doctor_document_number", format!("eq.{}", doctor.document_number)),
                    ("is_active", "eq.true".to_string()),
                    ("order", "day_of_week.asc,start_time.asc".to_string()),
                ],
            )
            .await?;

        rows.into_iter().map(parse_window).collect()
    }

    pub async fn update_availability(
        &self,
        availability_id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        let existing = self.get_availability(availability_id).await?;

        let start_time = request.start_time.unwrap_or(existing.start_time);
        let end_time = request.end_time.unwrap_or(existing.end_time);
        if start_time >= end_time {
            return Err(AvailabilityError::Validation(
                "start_time must be before end_time".into(),
            ));
        }

        let mut update_data = Map::new();

        if let Some(day_of_week) = request.day_of_week {
            if !(0..=6).contains(&day_of_week) {
                return Err(AvailabilityError::Validation(
                    "day_of_week must be between 0 (Monday) and 6 (Sunday)".into(),
                ));
            }
            update_data.insert("day_of_week".to_string(), json!(day_of_week));
        }
        if let Some(start) = request.start_time {
            update_data.insert(
                "start_time".to_string(),
                json!(start.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(end) = request.end_time {
            update_data.insert(
                "end_time".to_string(),
                json!(end.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(duration) = request.appointment_duration_minutes {
            if duration < 1 {
                return Err(AvailabilityError::Validation(
                    "appointment_duration_minutes must be at least 1".into(),
                ));
            }
            update_data.insert("appointment_duration_minutes".to_string(), json!(duration));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }
        if let Some(custom_fields) = request.custom_fields {
            update_data.insert("custom_fields".to_string(), custom_fields);
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let rows = self
            .db
            .update(
                tables::DOCTOR_AVAILABILITY,
                &[("id", format!("eq.{}", availability_id))],
                Value::Object(update_data),
            )
            .await?;

        let row = rows.into_iter().next().ok_or(AvailabilityError::NotFound)?;
        info!("Updated availability {}", availability_id);

        parse_window(row)
    }

    pub async fn delete_availability(&self, availability_id: Uuid) -> Result<(), AvailabilityError> {
        self.get_availability(availability_id).await?;

        self.db
            .delete(
                tables::DOCTOR_AVAILABILITY,
                &[("id", format!("eq.{}", availability_id))],
            )
            .await?;
        info!("Deleted availability {}", availability_id);

        Ok(())
    }

    pub async fn create_blocked_time(
        &self,
        request: CreateBlockedTimeRequest,
    ) -> Result<BlockedTime, AvailabilityError> {
        if request.start_datetime >= request.end_datetime {
            return Err(AvailabilityError::Validation(
                "start_datetime must be before end_datetime".into(),
            ));
        }
        if request.doctor_document_number.trim().is_empty() {
            return Err(AvailabilityError::Validation(
                "doctor_document_number must not be empty".into(),
            ));
        }

        let row = self
            .db
            .insert(
                tables::DOCTOR_BLOCKED_TIME,
                json!({
                    "doctor_document_type_id": request.doctor_document_type_id,
                    "doctor_document_number": request.doctor_document_number,
                    "start_datetime": request.start_datetime.to_rfc3339(),
                    "end_datetime": request.end_datetime.to_rfc3339(),
                    "reason": request.reason,
                    "is_active": true,
                    "custom_fields": request.custom_fields.unwrap_or_else(|| json!({})),
                    "created_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let blocked = parse_blocked(row)?;
        info!(
            "Created blocked time {} for doctor {}",
            blocked.id, blocked.doctor_document_number
        );

        Ok(blocked)
    }

    pub async fn list_blocked_times(
        &self,
        doctor: &DocumentIdentity,
    ) -> Result<Vec<BlockedTime>, AvailabilityError> {
        let rows = self
            .db
            .select(
                tables::DOCTOR_BLOCKED_TIME,
                &[
                    ("doctor_document_type_id", format!("eq.{}", doctor.document_type_id)),
                    ("doctor_document_number", format!("eq.{}", doctor.document_number)),
                    ("is_active", "eq.true".to_string()),
                    ("order", "start_datetime.asc".to_string()),
                ],
            )
            .await?;

        rows.into_iter().map(parse_blocked).collect()
    }

    pub async fn delete_blocked_time(&self, blocked_time_id: Uuid) -> Result<(), AvailabilityError> {
        let row = self
            .db
            .select_one(
                tables::DOCTOR_BLOCKED_TIME,
                &[("id", format!("eq.{}", blocked_time_id))],
            )
            .await?;
        if row.is_none() {
            return Err(AvailabilityError::NotFound);
        }

        self.db
            .delete(
                tables::DOCTOR_BLOCKED_TIME,
                &[("id", format!("eq.{}", blocked_time_id))],
            )
            .await?;
        info!("Deleted blocked time {}", blocked_time_id);

        Ok(())
    }

    async fn get_availability(&self, availability_id: Uuid) -> Result<AvailabilityWindow, AvailabilityError> {
        let row = self
            .db
            .select_one(
                tables::DOCTOR_AVAILABILITY,
                &[("id", format!("eq.{}", availability_id))],
            )
            .await?;

        match row {
            Some(row) => parse_window(row),
            None => Err(AvailabilityError::NotFound),
        }
    }
}

fn parse_window(row: Value) -> Result<AvailabilityWindow, AvailabilityError> {
    serde_json::from_value(row).map_err(|e| {
        AvailabilityError::Database(DbError::Invalid(format!("malformed availability row: {}", e)))
    })
}

fn parse_blocked(row: Value) -> Result<BlockedTime, AvailabilityError> {
    serde_json::from_value(row).map_err(|e| {
        AvailabilityError::Database(DbError::Invalid(format!("malformed blocked time row: {}", e)))
    })
}
