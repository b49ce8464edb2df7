use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::error::FieldError;
use shared_models::ClinicService;

use crate::models::{AvailabilityError, DateException, NewDateException, NewWeeklyRule, Schedule, WeeklyRule};
use crate::services::store::ScheduleStore;

/// Doctor-side management of weekly rules and date exceptions.
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    pub async fn schedule(&self) -> Result<Schedule, AvailabilityError> {
        let mut weekly_rules = self.store.weekly_rules().await?;
        weekly_rules.sort_by_key(|rule| (rule.day_of_week, rule.start_time));

        let mut exceptions = self.store.exceptions().await?;
        exceptions.sort_by_key(|exception| exception.date);

        Ok(Schedule { weekly_rules, exceptions })
    }

    pub async fn services(&self) -> Result<Vec<ClinicService>, AvailabilityError> {
        self.store.services().await
    }

    /// Replaces the whole weekly rule set. An empty list clears the schedule.
    pub async fn replace_weekly_rules(&self, rules: Vec<NewWeeklyRule>) -> Result<Vec<WeeklyRule>, AvailabilityError> {
        let mut errors = Vec::new();

        for (index, rule) in rules.iter().enumerate() {
            if rule.day_of_week > 6 {
                errors.push(FieldError::new(
                    format!("rules[{}].dayOfWeek", index),
                    "Day of week must be between 0 (Sunday) and 6 (Saturday)",
                ));
            }
            if !is_ordered(rule.start_time, rule.end_time) {
                errors.push(FieldError::new(
                    format!("rules[{}].endTime", index),
                    "Start time must be before end time",
                ));
            }
        }

        if !errors.is_empty() {
            return Err(AvailabilityError::Validation(errors));
        }

        let saved = self.store.replace_weekly_rules(rules).await?;
        info!("Weekly schedule replaced with {} rule(s)", saved.len());
        Ok(saved)
    }

    pub async fn add_exception(&self, mut exception: NewDateException) -> Result<DateException, AvailabilityError> {
        if exception.is_available {
            let mut errors = Vec::new();
            match (exception.start_time, exception.end_time) {
                (Some(start), Some(end)) if !is_ordered(start, end) => {
                    errors.push(FieldError::new("endTime", "Start time must be before end time"));
                }
                (Some(_), None) => errors.push(FieldError::new("endTime", "End time is required with a start time")),
                (None, Some(_)) => errors.push(FieldError::new("startTime", "Start time is required with an end time")),
                _ => {}
            }
            if !errors.is_empty() {
                return Err(AvailabilityError::Validation(errors));
            }
        } else {
            // A blocked day has no hours.
            exception.start_time = None;
            exception.end_time = None;
        }

        debug!("Adding schedule exception for {}", exception.date);
        let saved = self.store.add_exception(exception).await?;
        info!("Schedule exception {} added for {}", saved.id, saved.date);
        Ok(saved)
    }

    pub async fn delete_exception(&self, exception_id: Uuid) -> Result<(), AvailabilityError> {
        self.store.delete_exception(exception_id).await?;
        info!("Schedule exception {} deleted", exception_id);
        Ok(())
    }
}

/// A range must end after it starts, except that an end of 00:00 closes the day.
fn is_ordered(start: NaiveTime, end: NaiveTime) -> bool {
    start < end || (end == NaiveTime::MIN && start != NaiveTime::MIN)
}
