use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::models::BlockedTime;
use shared_database::{tables, DbError, ScopedDb};
use shared_models::auth::DocumentIdentity;

use crate::models::{Appointment, AppointmentError, STATE_CANCELLED};

/// Two half-open intervals [a, b) and [c, d) overlap iff a < d && c < b.
/// Back-to-back appointments (b == c) do not conflict.
fn intervals_overlap(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> bool {
    start_a < end_b && start_b < end_a
}

/// Pre-write collision detection over the request's bound scope. The storage
/// exclusion constraint remains the last word for concurrent writers; this
/// check gives well-formed rejections on the common path.
pub struct ConflictService<'a> {
    db: &'a ScopedDb,
}

impl<'a> ConflictService<'a> {
    pub fn new(db: &'a ScopedDb) -> Self {
        Self { db }
    }

    /// Whether [start, end) collides with any blocked interval or any other
    /// appointment still occupying this doctor's calendar. Assumes
    /// `start < end`; callers validate the interval shape. An appointment
    /// updating its own interval passes its id as `exclude`.
    pub async fn would_conflict(
        &self,
        doctor: &DocumentIdentity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        debug!(
            "Checking conflicts for doctor {} from {} to {}",
            doctor.document_number, start, end
        );

        let mut filters = vec![
            ("doctor_document_type_id", format!("eq.{}", doctor.document_type_id)),
            ("doctor_document_number", format!("eq.{}", doctor.document_number)),
            ("state", format!("neq.{}", STATE_CANCELLED)),
            ("start_utc", format!("lt.{}", end.to_rfc3339())),
            ("end_utc", format!("gt.{}", start.to_rfc3339())),
        ];
        if let Some(exclude_id) = exclude {
            filters.push(("id", format!("neq.{}", exclude_id)));
        }

        let rows = self.db.select(tables::APPOINTMENT, &filters).await?;
        let appointments = rows
            .into_iter()
            .map(parse_appointment)
            .collect::<Result<Vec<_>, _>>()?;

        let booked = appointments.iter().any(|appointment| {
            appointment.occupies_calendar()
                && intervals_overlap(start, end, appointment.start_utc, appointment.end_utc)
        });
        if booked {
            warn!(
                "Conflict detected for doctor {}: interval {} - {} already booked",
                doctor.document_number, start, end
            );
            return Ok(true);
        }

        let blocked_rows = self
            .db
            .select(
                tables::DOCTOR_BLOCKED_TIME,
                &[
                    ("doctor_document_type_id", format!("eq.{}", doctor.document_type_id)),
                    ("doctor_document_number", format!("eq.{}", doctor.document_number)),
                    ("is_active", "eq.true".to_string()),
                    ("start_datetime", format!("lt.{}", end.to_rfc3339())),
                    ("end_datetime", format!("gt.{}", start.to_rfc3339())),
                ],
            )
            .await?;

        let blocked = blocked_rows
            .into_iter()
            .map(parse_blocked)
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .any(|interval| intervals_overlap(start, end, interval.start_datetime, interval.end_datetime));

        if blocked {
            warn!(
                "Conflict detected for doctor {}: interval {} - {} is blocked",
                doctor.document_number, start, end
            );
        }

        Ok(blocked)
    }
}

pub(crate) fn parse_appointment(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row).map_err(|e| {
        AppointmentError::Database(DbError::Invalid(format!("malformed appointment row: {}", e)))
    })
}

fn parse_blocked(row: Value) -> Result<BlockedTime, AppointmentError> {
    serde_json::from_value(row).map_err(|e| {
        AppointmentError::Database(DbError::Invalid(format!("malformed blocked time row: {}", e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn half_open_intervals_overlap_only_when_strictly_crossing() {
        let a = (utc("2025-09-25T10:00:00Z"), utc("2025-09-25T10:30:00Z"));

        assert!(intervals_overlap(a.0, a.1, utc("2025-09-25T10:15:00Z"), utc("2025-09-25T10:45:00Z")));
        assert!(intervals_overlap(a.0, a.1, utc("2025-09-25T09:45:00Z"), utc("2025-09-25T10:15:00Z")));
        assert!(intervals_overlap(a.0, a.1, utc("2025-09-25T09:00:00Z"), utc("2025-09-25T12:00:00Z")));

        // Adjacent on either side: no overlap.
        assert!(!intervals_overlap(a.0, a.1, utc("2025-09-25T10:30:00Z"), utc("2025-09-25T11:00:00Z")));
        assert!(!intervals_overlap(a.0, a.1, utc("2025-09-25T09:30:00Z"), utc("2025-09-25T10:00:00Z")));
    }
}
