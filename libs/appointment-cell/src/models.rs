// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::{AppError, FieldError};
use shared_models::{AppointmentStatus, ClinicService};
use shared_utils::time_format::hhmm;

use availability_cell::AvailabilityError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub problem: Option<String>,
    pub status: AppointmentStatus,
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// PAYMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Bkash,
    Nagad,
    Rocket,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Bkash => "BKASH",
            PaymentMethod::Nagad => "NAGAD",
            PaymentMethod::Rocket => "ROCKET",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Initiated,
    PendingVerification,
    Paid,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::PendingVerification => "PENDING_VERIFICATION",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub sender_number: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One submission of manual payment details. Resubmissions after a rejection add rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub method: PaymentMethod,
    pub sender_number: String,
    pub transaction_id: String,
    pub notes: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// AUDIT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PaymentSubmitted,
    PaymentApproved,
    PaymentRejected,
    StatusChange,
    MeetingLinkProvided,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PaymentSubmitted => "PAYMENT_SUBMITTED",
            AuditAction::PaymentApproved => "PAYMENT_APPROVED",
            AuditAction::PaymentRejected => "PAYMENT_REJECTED",
            AuditAction::StatusChange => "STATUS_CHANGE",
            AuditAction::MeetingLinkProvided => "MEETING_LINK_PROVIDED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub action: AuditAction,
    pub details: Value,
    pub at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

/// Raw booking payload. Every field is optional at the wire level so that
/// validation can report all missing fields at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRequest {
    pub service_id: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub problem: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    /// Draft appointment being resumed.
    pub appointment_id: Option<String>,
}

/// Booking payload after field validation and normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub problem: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: Option<String>,
    pub draft_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReceipt {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub resumed: bool,
    pub new_patient: bool,
    pub credential_updated: bool,
}

/// What booking does to an existing patient record found by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityPolicy {
    /// The stored credential is never replaced by a booking.
    #[default]
    KeepExistingCredential,
    /// A booking that supplies a password takes over the account with that email.
    ClaimByEmail,
}

impl IdentityPolicy {
    pub fn from_config(allow_email_account_claim: bool) -> Self {
        if allow_email_account_claim {
            IdentityPolicy::ClaimByEmail
        } else {
            IdentityPolicy::KeepExistingCredential
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPaymentDetails {
    pub method: PaymentMethod,
    pub sender_number: String,
    pub transaction_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub action: VerificationDecision,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingLinkRequest {
    /// Absent to generate a room link.
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub patient_id: Option<Uuid>,
}

impl AppointmentFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        Self { patient_id: Some(patient_id), ..Self::default() }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |status| appointment.status == status)
            && self.patient_id.map_or(true, |patient_id| appointment.patient_id == patient_id)
            && self.date.map_or(true, |date| appointment.date == date)
            && self.from_date.map_or(true, |from| appointment.date >= from)
            && self.to_date.map_or(true, |to| appointment.date <= to)
    }
}

/// An appointment with everything the doctor console shows next to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Option<Patient>,
    pub service: Option<ClinicService>,
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Bearer token for the patient portal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub patient: Patient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleSummary {
    pub date: NaiveDate,
    pub active_today: usize,
    pub awaiting_verification: usize,
    pub confirmed_revenue: i64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Invalid booking: {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("This slot is already booked or pending verification")]
    SlotConflict,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment is already {0}")]
    Closed(AppointmentStatus),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Credential error: {0}")]
    Credential(String),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::Validation(fields) => AppError::ValidationError(fields),
            AppointmentError::SlotConflict => AppError::Conflict(AppointmentError::SlotConflict.to_string()),
            AppointmentError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            e @ (AppointmentError::InvalidStatusTransition { .. } | AppointmentError::Closed(_)) => {
                AppError::Conflict(e.to_string())
            }
            AppointmentError::InvalidCredentials => AppError::Auth(AppointmentError::InvalidCredentials.to_string()),
            AppointmentError::Store(msg) => AppError::Database(msg),
            AppointmentError::Credential(msg) => AppError::Internal(msg),
        }
    }
}

impl From<AvailabilityError> for AppointmentError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::Validation(fields) => AppointmentError::Validation(fields),
            AvailabilityError::NotFound(what) => AppointmentError::NotFound(what),
            AvailabilityError::Conflict(msg) | AvailabilityError::Store(msg) => AppointmentError::Store(msg),
        }
    }
}
