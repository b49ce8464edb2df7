// libs/appointment-cell/src/services/console.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use availability_cell::ScheduleStore;
use shared_models::{AppointmentStatus, ClinicService};

use crate::models::{AppointmentDetail, AppointmentError, AppointmentFilter, ConsoleSummary};
use crate::store::BookingStore;

/// Read side of the doctor console.
pub struct ConsoleService {
    bookings: Arc<dyn BookingStore>,
    schedule: Arc<dyn ScheduleStore>,
}

impl ConsoleService {
    pub fn new(bookings: Arc<dyn BookingStore>, schedule: Arc<dyn ScheduleStore>) -> Self {
        Self { bookings, schedule }
    }

    pub async fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentDetail>, AppointmentError> {
        let records = self.bookings.appointment_records(filter).await?;
        let services = self.services_by_id().await?;
        debug!("Console listing {} appointment(s)", records.len());

        Ok(records
            .into_iter()
            .map(|record| AppointmentDetail {
                service: services.get(&record.appointment.service_id).cloned(),
                appointment: record.appointment,
                patient: record.patient,
                payment: record.payment,
            })
            .collect())
    }

    pub async fn appointment(&self, appointment_id: Uuid) -> Result<AppointmentDetail, AppointmentError> {
        let appointment = self
            .bookings
            .appointment(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))?;

        let patient = self.bookings.patient(appointment.patient_id).await?;
        let payment = self.bookings.payment_for(appointment.id).await?;
        let service = self.schedule.service(appointment.service_id).await?;

        Ok(AppointmentDetail { appointment, patient, service, payment })
    }

    /// Active bookings for `today`, payments waiting on the doctor, and the fee total of confirmed bookings.
    pub async fn summary(&self, today: NaiveDate) -> Result<ConsoleSummary, AppointmentError> {
        let appointments = self.bookings.appointments(&AppointmentFilter::default()).await?;
        let services = self.services_by_id().await?;

        let active_today = appointments
            .iter()
            .filter(|appointment| appointment.date == today && !appointment.status.is_terminal())
            .count();
        let awaiting_verification = appointments
            .iter()
            .filter(|appointment| appointment.status == AppointmentStatus::PendingVerification)
            .count();
        let confirmed_revenue = appointments
            .iter()
            .filter(|appointment| appointment.status == AppointmentStatus::Confirmed)
            .filter_map(|appointment| services.get(&appointment.service_id))
            .map(|service| service.fee)
            .sum();

        Ok(ConsoleSummary { date: today, active_today, awaiting_verification, confirmed_revenue })
    }

    async fn services_by_id(&self) -> Result<HashMap<Uuid, ClinicService>, AppointmentError> {
        let services = self.schedule.services().await?;
        Ok(services.into_iter().map(|service| (service.id, service)).collect())
    }
}
