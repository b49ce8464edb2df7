// libs/appointment-cell/src/services/admission.rs
use std::sync::{Arc, OnceLock};

use chrono::{FixedOffset, NaiveTime};
use regex::Regex;
use tracing::{info, instrument};
use uuid::Uuid;

use shared_models::error::FieldError;
use shared_utils::time_format::{parse_calendar_date, parse_clock_time};

use crate::models::{AdmissionReceipt, AppointmentError, BookingRequest, IdentityPolicy, ValidatedBooking};
use crate::services::credentials::CredentialHasher;
use crate::store::{Admission, BookingStore};

const MIN_NAME_LENGTH: usize = 2;
const MIN_PHONE_LENGTH: usize = 11;
const MIN_PASSWORD_LENGTH: usize = 6;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"))
}

/// Turns a chosen slot into a persisted appointment. The store transaction is the
/// only double-booking guard; the slot grid the patient saw is never trusted.
pub struct AdmissionService {
    store: Arc<dyn BookingStore>,
    hasher: CredentialHasher,
    policy: IdentityPolicy,
    offset: FixedOffset,
}

impl AdmissionService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        hasher: CredentialHasher,
        policy: IdentityPolicy,
        offset: FixedOffset,
    ) -> Self {
        Self { store, hasher, policy, offset }
    }

    #[instrument(skip_all)]
    pub async fn admit(&self, request: BookingRequest) -> Result<AdmissionReceipt, AppointmentError> {
        let booking = validate_booking(request, self.offset)?;

        // Hashing is slow, so it happens before the transaction starts.
        let (secret, credential_supplied) = match booking.password {
            Some(password) => (password, true),
            None => (CredentialHasher::temporary_credential(), false),
        };
        let credential_hash = self.hasher.hash(secret).await?;

        let admission = Admission {
            service_id: booking.service_id,
            date: booking.date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            problem: booking.problem,
            name: booking.name,
            email: booking.email,
            phone: booking.phone,
            credential_hash,
            credential_supplied,
            policy: self.policy,
            draft_id: booking.draft_id,
        };

        let receipt = self.store.admit(admission).await?;

        info!(
            "Admitted appointment {} for {} {} (resumed: {}, new patient: {})",
            receipt.appointment_id,
            booking.date,
            booking.start_time.format("%H:%M"),
            receipt.resumed,
            receipt.new_patient
        );
        if receipt.credential_updated {
            info!("Patient {} credential replaced by booking", receipt.patient_id);
        }

        Ok(receipt)
    }
}

/// Field-level validation of a booking payload. Reports every bad field at once.
pub fn validate_booking(request: BookingRequest, offset: FixedOffset) -> Result<ValidatedBooking, AppointmentError> {
    let mut errors = Vec::new();

    let service_id = match non_empty(request.service_id.as_deref()) {
        Some(raw) => Uuid::parse_str(raw)
            .map_err(|_| errors.push(FieldError::new("serviceId", "Invalid service")))
            .ok(),
        None => {
            errors.push(FieldError::new("serviceId", "Service is required"));
            None
        }
    };

    let date = match non_empty(request.date.as_deref()) {
        Some(raw) => parse_calendar_date(raw, offset).or_else(|| {
            errors.push(FieldError::new("date", "Invalid date"));
            None
        }),
        None => {
            errors.push(FieldError::new("date", "Date is required"));
            None
        }
    };

    let start_time = clock_field(request.start_time.as_deref(), "startTime", "Invalid start time", &mut errors);
    let end_time = clock_field(request.end_time.as_deref(), "endTime", "Invalid end time", &mut errors);
    if let (Some(start), Some(end)) = (start_time, end_time) {
        let closes_at_midnight = end == NaiveTime::MIN && start != NaiveTime::MIN;
        if start >= end && !closes_at_midnight {
            errors.push(FieldError::new("endTime", "End time must be after start time"));
        }
    }

    let name = request.name.as_deref().map(str::trim).unwrap_or_default().to_string();
    if name.chars().count() < MIN_NAME_LENGTH {
        errors.push(FieldError::new("name", "Name is required"));
    }

    let email = normalize_email(request.email.as_deref().unwrap_or_default());
    if !email_pattern().is_match(&email) {
        errors.push(FieldError::new("email", "Invalid email"));
    }

    let phone = request.phone.as_deref().map(str::trim).unwrap_or_default().to_string();
    if phone.chars().count() < MIN_PHONE_LENGTH {
        errors.push(FieldError::new("phone", "Phone number is too short"));
    }

    // A blank password field counts as no password.
    let password = request.password.filter(|password| !password.is_empty());
    if password.as_ref().is_some_and(|password| password.chars().count() < MIN_PASSWORD_LENGTH) {
        errors.push(FieldError::new("password", "Password must be at least 6 characters"));
    }

    let draft_id = match non_empty(request.appointment_id.as_deref()) {
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(FieldError::new("appointmentId", "Invalid appointment id"));
                None
            }
        },
        None => None,
    };

    let problem = request
        .problem
        .map(|problem| problem.trim().to_string())
        .filter(|problem| !problem.is_empty());

    match (service_id, date, start_time, end_time) {
        (Some(service_id), Some(date), Some(start_time), Some(end_time)) if errors.is_empty() => Ok(ValidatedBooking {
            service_id,
            date,
            start_time,
            end_time,
            problem,
            name,
            email,
            phone,
            password,
            draft_id,
        }),
        _ => Err(AppointmentError::Validation(errors)),
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|raw| !raw.is_empty())
}

fn clock_field(raw: Option<&str>, field: &str, message: &str, errors: &mut Vec<FieldError>) -> Option<NaiveTime> {
    let parsed = non_empty(raw).and_then(parse_clock_time);
    if parsed.is_none() {
        errors.push(FieldError::new(field, message));
    }
    parsed
}
