// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_models::error::FieldError;
use shared_models::AppointmentStatus;

use crate::models::{Appointment, AppointmentError};
use crate::services::notification::{dispatch, Notifier, PatientMessage};
use crate::services::telemedicine::{is_valid_meeting_link, TelemedicineProvider};
use crate::store::BookingStore;

/// Doctor-driven status changes after a booking is confirmed.
pub struct LifecycleService {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
    telemedicine: TelemedicineProvider,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn BookingStore>, notifier: Arc<dyn Notifier>, telemedicine: TelemedicineProvider) -> Self {
        Self { store, notifier, telemedicine }
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.transition(appointment_id, AppointmentStatus::Completed).await?;
        info!("Appointment {} completed", appointment_id);
        Ok(appointment)
    }

    /// Cancelling frees the slot for new bookings.
    #[instrument(skip(self))]
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.transition(appointment_id, AppointmentStatus::Cancelled).await?;
        info!("Appointment {} cancelled", appointment_id);
        Ok(appointment)
    }

    /// Stores the given link, or a generated room link when none is given, and mails it to the patient.
    #[instrument(skip(self, link))]
    pub async fn set_meeting_link(
        &self,
        appointment_id: Uuid,
        link: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let link = match link.map(|link| link.trim().to_string()).filter(|link| !link.is_empty()) {
            Some(link) if is_valid_meeting_link(&link) => link,
            Some(_) => {
                return Err(AppointmentError::Validation(vec![FieldError::new(
                    "link",
                    "Meeting link must be an http(s) URL",
                )]))
            }
            None => self.telemedicine.room_link(appointment_id),
        };

        let appointment = self.store.set_meeting_link(appointment_id, link.clone()).await?;
        info!("Meeting link set for appointment {}", appointment_id);

        // The link is already stored; a failed lookup only costs the email.
        match self.store.patient(appointment.patient_id).await {
            Ok(Some(patient)) => {
                dispatch(self.notifier.clone(), PatientMessage::meeting_link(&patient, &link));
            }
            Ok(None) => warn!("Patient {} missing, meeting link not sent", appointment.patient_id),
            Err(e) => warn!("Could not load patient for appointment {}, meeting link not sent: {}", appointment_id, e),
        }

        Ok(appointment)
    }
}
