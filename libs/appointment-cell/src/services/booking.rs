use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{tables, DbError, ScopedDb};
use shared_models::auth::{DocumentIdentity, TenantContext};
use shared_models::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, CreateAppointmentRequest,
    UpdateAppointmentRequest, STATE_CANCELLED,
};
use crate::services::conflict::{parse_appointment, ConflictService};

const DEFAULT_STATE: &str = "scheduled";
const DEFAULT_NOTIFICATION_STATE: &str = "pending";

/// Appointment lifecycle over the request's bound scope. The check-then-insert
/// race between concurrent bookings is settled by the storage exclusion
/// constraint over (tenant, doctor identity, interval): the losing writer's
/// insert comes back as a conflict, never a silent double booking.
pub struct BookingService {
    db: ScopedDb,
}

impl BookingService {
    pub fn bind(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(Self {
            db: ScopedDb::bind(config, ctx)?,
        })
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        validate_interval(request.start_datetime, request.end_datetime)?;
        if request.modality.trim().is_empty() {
            return Err(AppointmentError::Validation("modality must not be empty".into()));
        }
        if request.doctor_document_number.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "doctor_document_number must not be empty".into(),
            ));
        }
        if request.patient_document_number.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "patient_document_number must not be empty".into(),
            ));
        }

        let doctor = DocumentIdentity::new(
            request.doctor_document_type_id,
            request.doctor_document_number.clone(),
        );

        let conflicts = ConflictService::new(&self.db)
            .would_conflict(&doctor, request.start_datetime, request.end_datetime, None)
            .await?;
        if conflicts {
            return Err(AppointmentError::Conflict(
                "requested interval is no longer available for this doctor".into(),
            ));
        }

        debug!(
            "Booking doctor {} from {} to {}",
            doctor.document_number, request.start_datetime, request.end_datetime
        );

        let body = json!({
            "start_utc": request.start_datetime.to_rfc3339(),
            "end_utc": request.end_datetime.to_rfc3339(),
            "patient_document_type_id": request.patient_document_type_id,
            "patient_document_number": request.patient_document_number,
            "doctor_document_type_id": request.doctor_document_type_id,
            "doctor_document_number": request.doctor_document_number,
            "modality": request.modality,
            "state": request.state.unwrap_or_else(|| DEFAULT_STATE.to_string()),
            "notification_state": DEFAULT_NOTIFICATION_STATE,
            "appointment_type": request.appointment_type,
            "clinic_id": request.clinic_id,
            "comment": request.comment,
            "custom_fields": request.custom_fields.unwrap_or_else(|| json!({})),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let row = match self.db.insert(tables::APPOINTMENT, body).await {
            Ok(row) => row,
            Err(DbError::Conflict(detail)) => {
                return Err(self
                    .lost_booking_race(&doctor, request.start_datetime, request.end_datetime, detail)
                    .await)
            }
            Err(other) => return Err(other.into()),
        };

        let appointment = parse_appointment(row)?;
        info!(
            "Created appointment {} for tenant {}",
            appointment.id,
            self.db.tenant_id()
        );

        Ok(appointment)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let row = self
            .db
            .select_one(tables::APPOINTMENT, &[("id", format!("eq.{}", appointment_id))])
            .await?;

        match row {
            Some(row) => parse_appointment(row),
            None => Err(AppointmentError::NotFound),
        }
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut filters: Vec<(&str, String)> = Vec::new();

        if let Some(start_date) = query.start_date {
            filters.push(("start_utc", format!("gte.{}", start_date.to_rfc3339())));
        }
        if let Some(end_date) = query.end_date {
            filters.push(("end_utc", format!("lte.{}", end_date.to_rfc3339())));
        }
        if let Some(modality) = &query.modality {
            filters.push(("modality", format!("eq.{}", modality)));
        }
        if let Some(state) = &query.state {
            filters.push(("state", format!("eq.{}", state)));
        }
        if let Some(patient_document_number) = &query.patient_document_number {
            filters.push(("patient_document_number", format!("eq.{}", patient_document_number)));
        }
        if let Some(doctor_document_number) = &query.doctor_document_number {
            filters.push(("doctor_document_number", format!("eq.{}", doctor_document_number)));
        }

        filters.push(("order", "start_utc.desc".to_string()));
        filters.push(("limit", query.limit.unwrap_or(50).to_string()));
        filters.push(("offset", query.offset.unwrap_or(0).to_string()));

        let rows = self.db.select(tables::APPOINTMENT, &filters).await?;
        debug!("Appointment search returned {} rows", rows.len());

        rows.into_iter().map(parse_appointment).collect()
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let existing = self.get_appointment(appointment_id).await?;

        let start = request.start_datetime.unwrap_or(existing.start_utc);
        let end = request.end_datetime.unwrap_or(existing.end_utc);
        validate_interval(start, end)?;

        let interval_changed = start != existing.start_utc || end != existing.end_utc;
        let state_reactivates = matches!(&request.state, Some(state) if state != STATE_CANCELLED)
            && existing.state == STATE_CANCELLED;

        // Re-check the calendar whenever the occupied interval could change,
        // with the appointment's own row excluded so it never conflicts with
        // itself.
        if interval_changed || state_reactivates {
            let conflicts = ConflictService::new(&self.db)
                .would_conflict(&existing.doctor_identity(), start, end, Some(appointment_id))
                .await?;
            if conflicts {
                return Err(AppointmentError::Conflict(
                    "updated interval is no longer available for this doctor".into(),
                ));
            }
        }

        let mut update_data = Map::new();
        if let Some(start_datetime) = request.start_datetime {
            update_data.insert("start_utc".to_string(), json!(start_datetime.to_rfc3339()));
        }
        if let Some(end_datetime) = request.end_datetime {
            update_data.insert("end_utc".to_string(), json!(end_datetime.to_rfc3339()));
        }
        if let Some(modality) = request.modality {
            if modality.trim().is_empty() {
                return Err(AppointmentError::Validation("modality must not be empty".into()));
            }
            update_data.insert("modality".to_string(), json!(modality));
        }
        if let Some(state) = request.state {
            update_data.insert("state".to_string(), json!(state));
        }
        if let Some(notification_state) = request.notification_state {
            update_data.insert("notification_state".to_string(), json!(notification_state));
        }
        if let Some(appointment_type) = request.appointment_type {
            update_data.insert("appointment_type".to_string(), json!(appointment_type));
        }
        if let Some(clinic_id) = request.clinic_id {
            update_data.insert("clinic_id".to_string(), json!(clinic_id));
        }
        if let Some(comment) = request.comment {
            update_data.insert("comment".to_string(), json!(comment));
        }
        if let Some(custom_fields) = request.custom_fields {
            update_data.insert("custom_fields".to_string(), custom_fields);
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let rows = match self
            .db
            .update(
                tables::APPOINTMENT,
                &[("id", format!("eq.{}", appointment_id))],
                Value::Object(update_data),
            )
            .await
        {
            Ok(rows) => rows,
            Err(DbError::Conflict(detail)) => {
                return Err(self
                    .lost_booking_race(&existing.doctor_identity(), start, end, detail)
                    .await)
            }
            Err(other) => return Err(other.into()),
        };

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        let appointment = parse_appointment(row)?;
        info!("Updated appointment {}", appointment_id);

        Ok(appointment)
    }

    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        self.get_appointment(appointment_id).await?;

        self.db
            .delete(tables::APPOINTMENT, &[("id", format!("eq.{}", appointment_id))])
            .await?;
        info!("Deleted appointment {}", appointment_id);

        Ok(())
    }

    /// A concurrent writer committed first and the storage constraint
    /// rejected ours. Re-run the checker so the collision is observed against
    /// committed state, then report a scheduling conflict either way.
    async fn lost_booking_race(
        &self,
        doctor: &DocumentIdentity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        detail: String,
    ) -> AppointmentError {
        warn!(
            "Storage rejected booking for doctor {} ({} - {}): {}",
            doctor.document_number, start, end, detail
        );

        match ConflictService::new(&self.db)
            .would_conflict(doctor, start, end, None)
            .await
        {
            Ok(true) | Ok(false) => AppointmentError::Conflict(
                "a concurrent booking took this interval; re-query slots and pick another".into(),
            ),
            Err(err) => err,
        }
    }
}

fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppointmentError> {
    if end <= start {
        return Err(AppointmentError::Validation(
            "start_datetime must be before end_datetime".into(),
        ));
    }
    Ok(())
}
