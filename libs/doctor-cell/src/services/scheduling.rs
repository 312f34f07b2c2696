use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{tables, DbError, ScopedDb};
use shared_models::auth::{DocumentIdentity, TenantContext};
use shared_models::AppError;

use crate::models::{AvailabilityError, AvailabilityWindow, BlockedTime, TimeSlot};
use crate::services::slots::{build_day_slots, day_bounds_utc, intervals_overlap, weekday_index};

/// The occupied span of an appointment row; scheduling only ever needs the
/// interval, not the rest of the record.
#[derive(Debug, Deserialize)]
struct BusyInterval {
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
}

/// Read side of the calendar: offerable slots for a date, and point checks
/// for a proposed interval. All reads go through the bound tenant scope.
pub struct SchedulingService {
    db: ScopedDb,
    utc_offset_minutes: i32,
}

impl SchedulingService {
    pub fn bind(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(Self {
            db: ScopedDb::bind(config, ctx)?,
            utc_offset_minutes: config.clinic_utc_offset_minutes,
        })
    }

    /// Offerable slots for one doctor on one civil date, booked and blocked
    /// ones included with `available: false`. A date without windows yields
    /// an empty list.
    pub async fn get_time_slots(
        &self,
        doctor: &DocumentIdentity,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, AvailabilityError> {
        debug!(
            "Computing slots for doctor {} on {}",
            doctor.document_number, date
        );

        let windows = self.windows_for_day(doctor, weekday_index(date)).await?;
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let (day_start, day_end) = day_bounds_utc(date, self.utc_offset_minutes);
        let blocked = self.blocked_intervals(doctor, day_start, day_end).await?;
        let busy = self.busy_intervals(doctor, day_start, day_end).await?;

        Ok(build_day_slots(
            date,
            &windows,
            &blocked,
            &busy,
            self.utc_offset_minutes,
        ))
    }

    /// Whether [start, end) lies inside some work window and collides with
    /// nothing. Assumes `start < end`; callers validate the interval shape.
    pub async fn check_availability(
        &self,
        doctor: &DocumentIdentity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, AvailabilityError> {
        let civil_start = start.naive_utc() + Duration::minutes(self.utc_offset_minutes as i64);
        let civil_end = end.naive_utc() + Duration::minutes(self.utc_offset_minutes as i64);

        // Intervals spanning civil midnight never fit a single-day window.
        if civil_start.date() != civil_end.date() {
            return Ok(false);
        }

        let windows = self
            .windows_for_day(doctor, weekday_index(civil_start.date()))
            .await?;

        let within_working_hours = windows.iter().any(|window| {
            civil_start.time() >= window.start_time && civil_end.time() <= window.end_time
        });
        if !within_working_hours {
            return Ok(false);
        }

        let blocked = self.blocked_intervals(doctor, start, end).await?;
        if blocked
            .iter()
            .any(|(blocked_start, blocked_end)| intervals_overlap(start, end, *blocked_start, *blocked_end))
        {
            return Ok(false);
        }

        let busy = self.busy_intervals(doctor, start, end).await?;
        Ok(!busy
            .iter()
            .any(|(busy_start, busy_end)| intervals_overlap(start, end, *busy_start, *busy_end)))
    }

    async fn windows_for_day(
        &self,
        doctor: &DocumentIdentity,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let rows = self
            .db
            .select(
                tables::DOCTOR_AVAILABILITY,
                &[
                    ("doctor_document_type_id", format!("eq.{}", doctor.document_type_id)),
                    ("doctor_document_number", format!("eq.{}", doctor.document_number)),
                    ("day_of_week", format!("eq.{}", day_of_week)),
                    ("is_active", "eq.true".to_string()),
                    ("order", "start_time.asc".to_string()),
                ],
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AvailabilityError::Database(DbError::Invalid(format!(
                        "malformed availability row: {}",
                        e
                    )))
                })
            })
            .collect()
    }

    async fn blocked_intervals(
        &self,
        doctor: &DocumentIdentity,
        span_start: DateTime<Utc>,
        span_end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, AvailabilityError> {
        let rows = self
            .db
            .select(
                tables::DOCTOR_BLOCKED_TIME,
                &[
                    ("doctor_document_type_id", format!("eq.{}", doctor.document_type_id)),
                    ("doctor_document_number", format!("eq.{}", doctor.document_number)),
                    ("is_active", "eq.true".to_string()),
                    ("start_datetime", format!("lt.{}", span_end.to_rfc3339())),
                    ("end_datetime", format!("gt.{}", span_start.to_rfc3339())),
                ],
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                let blocked: BlockedTime = serde_json::from_value(row).map_err(|e| {
                    AvailabilityError::Database(DbError::Invalid(format!(
                        "malformed blocked time row: {}",
                        e
                    )))
                })?;
                Ok((blocked.start_datetime, blocked.end_datetime))
            })
            .collect()
    }

    async fn busy_intervals(
        &self,
        doctor: &DocumentIdentity,
        span_start: DateTime<Utc>,
        span_end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, AvailabilityError> {
        let rows = self
            .db
            .select(
                tables::APPOINTMENT,
                &[
                    ("doctor_document_type_id", format!("eq.{}", doctor.document_type_id)),
                    ("doctor_document_number", format!("eq.{}", doctor.document_number)),
                    // Cancelled appointments release their slot.
                    ("state", "neq.cancelled".to_string()),
                    ("start_utc", format!("lt.{}", span_end.to_rfc3339())),
                    ("end_utc", format!("gt.{}", span_start.to_rfc3339())),
                ],
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                let busy: BusyInterval = serde_json::from_value(row).map_err(|e| {
                    AvailabilityError::Database(DbError::Invalid(format!(
                        "malformed appointment row: {}",
                        e
                    )))
                })?;
                Ok((busy.start_utc, busy.end_utc))
            })
            .collect()
    }
}
