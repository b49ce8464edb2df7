// libs/appointment-cell/src/services/portal.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use availability_cell::ScheduleStore;
use shared_models::auth::{JwtClaims, PATIENT_ROLE};
use shared_utils::jwt::issue_token;

use crate::models::{AppointmentDetail, AppointmentError, AppointmentFilter, PatientSession, SignInRequest};
use crate::services::admission::normalize_email;
use crate::services::credentials::CredentialHasher;
use crate::store::BookingStore;

const PATIENT_SESSION_HOURS: i64 = 12;

/// Patient-facing side: sign in with the credential chosen at booking, then list own appointments.
pub struct PatientPortal {
    bookings: Arc<dyn BookingStore>,
    schedule: Arc<dyn ScheduleStore>,
    hasher: CredentialHasher,
    jwt_secret: String,
}

impl PatientPortal {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        schedule: Arc<dyn ScheduleStore>,
        hasher: CredentialHasher,
        jwt_secret: String,
    ) -> Self {
        Self { bookings, schedule, hasher, jwt_secret }
    }

    /// Unknown email and wrong password fail the same way.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, request: SignInRequest) -> Result<PatientSession, AppointmentError> {
        let email = normalize_email(&request.email);
        let Some(patient) = self.bookings.patient_by_email(&email).await? else {
            debug!("Sign-in attempt for an unknown email");
            return Err(AppointmentError::InvalidCredentials);
        };

        let verified = match self.hasher.matches(request.password, patient.credential_hash.clone()).await {
            Ok(verified) => verified,
            Err(e) => {
                warn!("Stored credential for patient {} is unusable: {}", patient.id, e);
                false
            }
        };
        if !verified {
            return Err(AppointmentError::InvalidCredentials);
        }

        let now = Utc::now();
        let expires_at = now + Duration::hours(PATIENT_SESSION_HOURS);
        let claims = JwtClaims {
            sub: patient.id.to_string(),
            exp: Some(expires_at.timestamp() as u64),
            email: Some(patient.email.clone()),
            role: Some(PATIENT_ROLE.to_string()),
            user_metadata: Some(json!({ "name": patient.name })),
            aud: Some("authenticated".to_string()),
            iat: Some(now.timestamp() as u64),
        };
        let token = issue_token(&claims, &self.jwt_secret).map_err(AppointmentError::Credential)?;

        info!("Patient {} signed in", patient.id);
        Ok(PatientSession { token, expires_at, patient })
    }

    /// Appointments of the patient with `email`, latest date first.
    pub async fn appointments(&self, email: &str) -> Result<Vec<AppointmentDetail>, AppointmentError> {
        let Some(patient) = self.bookings.patient_by_email(&normalize_email(email)).await? else {
            return Ok(Vec::new());
        };

        let records = self
            .bookings
            .appointment_records(&AppointmentFilter::for_patient(patient.id))
            .await?;
        let services: HashMap<_, _> = self
            .schedule
            .services()
            .await?
            .into_iter()
            .map(|service| (service.id, service))
            .collect();

        Ok(records
            .into_iter()
            .rev()
            .map(|record| AppointmentDetail {
                service: services.get(&record.appointment.service_id).cloned(),
                appointment: record.appointment,
                patient: record.patient,
                payment: record.payment,
            })
            .collect())
    }
}
