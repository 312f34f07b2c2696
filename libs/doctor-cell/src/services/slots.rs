use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::models::{AvailabilityWindow, TimeSlot};

/// Monday-based weekday index of a civil date (0 = Monday .. 6 = Sunday).
pub fn weekday_index(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_monday() as i32
}

/// Half-open interval overlap: [a, b) and [c, d) overlap iff a < d && c < b.
/// Adjacent intervals (b == c) do not overlap.
pub fn intervals_overlap(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> bool {
    start_a < end_b && start_b < end_a
}

/// Windows store civil times-of-day; everything emitted is UTC. The clinic's
/// civil clock is a fixed offset from UTC taken from configuration.
fn civil_to_utc(naive: NaiveDateTime, utc_offset_minutes: i32) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive - Duration::minutes(utc_offset_minutes as i64), Utc)
}

/// UTC span covering the civil date from midnight to midnight.
pub fn day_bounds_utc(date: NaiveDate, utc_offset_minutes: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = civil_to_utc(date.and_time(chrono::NaiveTime::MIN), utc_offset_minutes);
    (start, start + Duration::days(1))
}

/// Expand the day's windows into the ordered candidate-slot list and flag
/// each against the blocked and busy intervals. Pure: identical inputs always
/// produce the identical sequence.
pub fn build_day_slots(
    date: NaiveDate,
    windows: &[AvailabilityWindow],
    blocked: &[(DateTime<Utc>, DateTime<Utc>)],
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
    utc_offset_minutes: i32,
) -> Vec<TimeSlot> {
    let day_of_week = weekday_index(date);
    let mut slots: Vec<TimeSlot> = Vec::new();

    for window in windows {
        if !window.is_active
            || window.day_of_week != day_of_week
            || window.appointment_duration_minutes < 1
        {
            continue;
        }

        let step = Duration::minutes(window.appointment_duration_minutes as i64);
        let window_end = date.and_time(window.end_time);
        let mut current = date.and_time(window.start_time);

        // A trailing period shorter than the configured duration is discarded.
        while current + step <= window_end {
            let start_datetime = civil_to_utc(current, utc_offset_minutes);
            let end_datetime = civil_to_utc(current + step, utc_offset_minutes);

            let taken = blocked
                .iter()
                .chain(busy.iter())
                .any(|(start, end)| intervals_overlap(start_datetime, end_datetime, *start, *end));

            slots.push(TimeSlot {
                start_datetime,
                end_datetime,
                available: !taken,
            });

            current += step;
        }
    }

    // Overlapping windows are tolerated: candidates are collapsed by start
    // instant, earliest window wins.
    slots.sort_by_key(|slot| slot.start_datetime);
    slots.dedup_by_key(|slot| slot.start_datetime);

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use serde_json::json;
    use uuid::Uuid;

    fn window(day_of_week: i32, start: &str, end: &str, duration: i32) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            doctor_document_type_id: 1,
            doctor_document_number: "800123".into(),
            day_of_week,
            start_time: start.parse::<NaiveTime>().unwrap(),
            end_time: end.parse::<NaiveTime>().unwrap(),
            appointment_duration_minutes: duration,
            is_active: true,
            custom_fields: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    // 2025-09-22 is a Monday.
    const MONDAY: &str = "2025-09-22";

    #[test]
    fn monday_morning_window_with_one_blocked_slot() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let windows = vec![window(0, "09:00:00", "12:00:00", 30)];
        let blocked = vec![(utc("2025-09-22T10:00:00Z"), utc("2025-09-22T10:30:00Z"))];

        let slots = build_day_slots(date, &windows, &blocked, &[], 0);

        assert_eq!(slots.len(), 6);
        let starts: Vec<String> = slots
            .iter()
            .map(|slot| slot.start_datetime.format("%H:%M").to_string())
            .collect();
        assert_eq!(starts, ["09:00", "09:30", "10:00", "10:30", "11:00", "11:30"]);

        for slot in &slots {
            let expect_available = slot.start_datetime != utc("2025-09-22T10:00:00Z");
            assert_eq!(slot.available, expect_available, "slot {:?}", slot.start_datetime);
        }
    }

    #[test]
    fn booked_interval_marks_overlapping_slot_unavailable() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let windows = vec![window(0, "09:00:00", "11:00:00", 30)];
        let busy = vec![(utc("2025-09-22T09:15:00Z"), utc("2025-09-22T09:45:00Z"))];

        let slots = build_day_slots(date, &windows, &[], &busy, 0);

        // 09:00 and 09:30 both overlap the booking; 10:00 and 10:30 do not.
        assert_eq!(
            slots.iter().map(|s| s.available).collect::<Vec<_>>(),
            [false, false, true, true]
        );
    }

    #[test]
    fn adjacent_intervals_do_not_conflict() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let windows = vec![window(0, "10:00:00", "11:00:00", 30)];
        // Ends exactly where the first slot starts.
        let busy = vec![(utc("2025-09-22T09:30:00Z"), utc("2025-09-22T10:00:00Z"))];

        let slots = build_day_slots(date, &windows, &[], &busy, 0);
        assert!(slots.iter().all(|slot| slot.available));
    }

    #[test]
    fn trailing_partial_period_is_discarded() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let windows = vec![window(0, "09:00:00", "10:45:00", 30)];

        let slots = build_day_slots(date, &windows, &[], &[], 0);

        assert_eq!(slots.len(), 3);
        assert_eq!(slots.last().unwrap().end_datetime, utc("2025-09-22T10:30:00Z"));
    }

    #[test]
    fn overlapping_windows_collapse_to_one_slot_per_start() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let windows = vec![
            window(0, "09:00:00", "11:00:00", 60),
            window(0, "10:00:00", "12:00:00", 60),
        ];

        let slots = build_day_slots(date, &windows, &[], &[], 0);

        let starts: Vec<String> = slots
            .iter()
            .map(|slot| slot.start_datetime.format("%H:%M").to_string())
            .collect();
        assert_eq!(starts, ["09:00", "10:00", "11:00"]);
    }

    #[test]
    fn no_windows_for_the_day_yields_an_empty_sequence() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        // Tuesday window only.
        let windows = vec![window(1, "09:00:00", "12:00:00", 30)];

        assert!(build_day_slots(date, &windows, &[], &[], 0).is_empty());
    }

    #[test]
    fn inactive_windows_are_skipped() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let mut inactive = window(0, "09:00:00", "12:00:00", 30);
        inactive.is_active = false;

        assert!(build_day_slots(date, &[inactive], &[], &[], 0).is_empty());
    }

    #[test]
    fn civil_times_are_shifted_by_the_configured_offset() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let windows = vec![window(0, "09:00:00", "10:00:00", 60)];

        // Civil 09:00 at UTC-5 is 14:00Z.
        let slots = build_day_slots(date, &windows, &[], &[], -300);

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_datetime, utc("2025-09-22T14:00:00Z"));
        assert_eq!(slots[0].end_datetime, utc("2025-09-22T15:00:00Z"));
    }

    #[test]
    fn identical_inputs_produce_identical_sequences() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let windows = vec![
            window(0, "14:00:00", "17:00:00", 45),
            window(0, "08:00:00", "12:00:00", 45),
        ];
        let blocked = vec![(utc("2025-09-22T08:45:00Z"), utc("2025-09-22T09:30:00Z"))];
        let busy = vec![(utc("2025-09-22T15:00:00Z"), utc("2025-09-22T15:45:00Z"))];

        let first = build_day_slots(date, &windows, &blocked, &busy, 0);
        let second = build_day_slots(date, &windows, &blocked, &busy, 0);

        assert_eq!(first, second);
        assert!(first.windows(2).all(|pair| pair[0].start_datetime < pair[1].start_datetime));
    }

    #[test]
    fn day_bounds_cover_the_civil_day() {
        let date: NaiveDate = MONDAY.parse().unwrap();
        let (start, end) = day_bounds_utc(date, -300);

        assert_eq!(start, utc("2025-09-22T05:00:00Z"));
        assert_eq!(end, utc("2025-09-23T05:00:00Z"));
    }
}
