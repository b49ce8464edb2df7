use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use shared_models::AppointmentStatus;
use shared_utils::ClinicClock;

use crate::models::{AvailabilityError, BookedRange, DateException, Slot, WeeklyRule};
use crate::services::store::ScheduleStore;

/// Builds the slot grid for one date.
///
/// Precedence: a blocking exception empties the day; an open exception with both
/// hours replaces the weekday's rules; any other open exception (or none) keeps the
/// weekday's rules. Every range is walked independently from its own start in
/// `slot_duration_minutes` steps and a slot is kept while it ends no later than the
/// range. Ranges are neither merged nor sorted, so overlapping rules yield
/// overlapping slots in input order.
///
/// A slot is unavailable when `date` is the clinic-local today and it starts before
/// `now_local`, or when it overlaps a booked range.
pub fn resolve_slots(
    date: NaiveDate,
    rules: &[WeeklyRule],
    exceptions: &[DateException],
    booked: &[BookedRange],
    slot_duration_minutes: u32,
    now_local: NaiveDateTime,
) -> Vec<Slot> {
    if slot_duration_minutes == 0 {
        return Vec::new();
    }

    let ranges = active_ranges(date, rules, exceptions);
    if ranges.is_empty() {
        return Vec::new();
    }

    let step = Duration::minutes(i64::from(slot_duration_minutes));
    let is_today = date == now_local.date();
    let booked: Vec<(NaiveDateTime, NaiveDateTime)> = booked
        .iter()
        .map(|range| window(date, range.start_time, range.end_time))
        .collect();

    let mut slots = Vec::new();

    for (range_start, range_end) in ranges {
        let mut cursor = range_start;

        while let Some(slot_end) = cursor.checked_add_signed(step) {
            if slot_end > range_end {
                break;
            }

            let is_past = is_today && cursor < now_local;
            let is_booked = booked
                .iter()
                .any(|(booked_start, booked_end)| cursor < *booked_end && slot_end > *booked_start);

            slots.push(Slot {
                start_time: cursor.time(),
                end_time: slot_end.time(),
                is_available: !is_past && !is_booked,
            });

            cursor = slot_end;
        }
    }

    slots
}

fn active_ranges(
    date: NaiveDate,
    rules: &[WeeklyRule],
    exceptions: &[DateException],
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let day_of_week = date.weekday().num_days_from_sunday();

    // Duplicate exceptions for one date are not expected; the first one wins.
    if let Some(exception) = exceptions.iter().find(|e| e.date == date) {
        if !exception.is_available {
            return Vec::new();
        }
        if let Some((start, end)) = exception.custom_hours() {
            return vec![window(date, start, end)];
        }
    }

    rules
        .iter()
        .filter(|rule| u32::from(rule.day_of_week) == day_of_week)
        .map(|rule| window(date, rule.start_time, rule.end_time))
        .collect()
}

/// Places a wall-clock range on `date`. An end of 00:00 means the following midnight.
fn window(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> (NaiveDateTime, NaiveDateTime) {
    let start_at = date.and_time(start);
    let end_at = date.and_time(end);

    if end == NaiveTime::MIN && start != NaiveTime::MIN {
        let next_midnight = end_at.checked_add_signed(Duration::days(1)).unwrap_or(end_at);
        return (start_at, next_midnight);
    }

    (start_at, end_at)
}

pub struct SlotService {
    store: Arc<dyn ScheduleStore>,
    clock: ClinicClock,
}

impl SlotService {
    pub fn new(store: Arc<dyn ScheduleStore>, clock: ClinicClock) -> Self {
        Self { store, clock }
    }

    /// Slot grid for `service_id` on `date`, greyed out by bookings that hold the slot for display.
    pub async fn slots_for(&self, service_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, AvailabilityError> {
        debug!("Calculating slots for service {} on {}", service_id, date);

        let service = self
            .store
            .service(service_id)
            .await?
            .ok_or_else(|| AvailabilityError::NotFound("Service".to_string()))?;

        let rules = self.store.weekly_rules().await?;
        let exceptions = self.store.exceptions_on(date).await?;
        let booked = self
            .store
            .booked_ranges(date, &AppointmentStatus::SLOT_DISPLAY_HOLDING)
            .await?;

        let slots = resolve_slots(
            date,
            &rules,
            &exceptions,
            &booked,
            service.duration_minutes,
            self.clock.now_local(),
        );

        debug!(
            "Resolved {} slots ({} bookable) for {}",
            slots.len(),
            slots.iter().filter(|slot| slot.is_available).count(),
            date
        );
        Ok(slots)
    }
}
