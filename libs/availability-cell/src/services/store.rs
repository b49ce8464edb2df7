use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_models::{AppointmentStatus, ClinicService};

use crate::models::{AvailabilityError, BookedRange, DateException, NewDateException, NewWeeklyRule, WeeklyRule};

/// Data access for the single doctor's schedule and the bookings that occupy it.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn services(&self) -> Result<Vec<ClinicService>, AvailabilityError>;

    async fn service(&self, service_id: Uuid) -> Result<Option<ClinicService>, AvailabilityError>;

    async fn weekly_rules(&self) -> Result<Vec<WeeklyRule>, AvailabilityError>;

    /// Replace-all: the previous rule set is discarded in the same write.
    async fn replace_weekly_rules(&self, rules: Vec<NewWeeklyRule>) -> Result<Vec<WeeklyRule>, AvailabilityError>;

    async fn exceptions(&self) -> Result<Vec<DateException>, AvailabilityError>;

    async fn exceptions_on(&self, date: NaiveDate) -> Result<Vec<DateException>, AvailabilityError>;

    /// Fails with `Conflict` when the date already carries an exception.
    async fn add_exception(&self, exception: NewDateException) -> Result<DateException, AvailabilityError>;

    async fn delete_exception(&self, exception_id: Uuid) -> Result<(), AvailabilityError>;

    async fn booked_ranges(
        &self,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<BookedRange>, AvailabilityError>;
}
