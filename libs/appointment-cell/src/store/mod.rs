pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use shared_models::AppointmentStatus;

use crate::models::{
    AdmissionReceipt, Appointment, AppointmentError, AppointmentFilter, AuditEntry, IdentityPolicy,
    ManualPaymentDetails, Patient, Payment, PaymentAttempt, VerificationDecision,
};

pub use memory::{ClinicLedger, MemoryClinicStore};
pub use supabase::SupabaseClinicStore;

/// Everything the store needs to admit one booking in a single transaction.
/// The credential is already hashed; hashing never happens while the store is locked.
#[derive(Debug, Clone)]
pub struct Admission {
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub problem: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub credential_hash: String,
    /// False when the hash belongs to a generated temporary credential.
    pub credential_supplied: bool,
    pub policy: IdentityPolicy,
    pub draft_id: Option<Uuid>,
}

/// State after a verification decision, returned so the caller can notify the patient.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub appointment: Appointment,
    pub patient: Patient,
    pub payment: Payment,
}

/// An appointment with its patient and payment, read in one go.
#[derive(Debug, Clone)]
pub struct AppointmentRecord {
    pub appointment: Appointment,
    pub patient: Option<Patient>,
    pub payment: Option<Payment>,
}

/// Persistence for bookings, payments and the audit trail.
///
/// Every write method is one atomic unit: it either applies all of its changes or none.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Conflict check, patient resolution, appointment and payment writes as one transaction.
    /// Fails with `SlotConflict` when another appointment holds the same date and start time.
    async fn admit(&self, admission: Admission) -> Result<AdmissionReceipt, AppointmentError>;

    async fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Matching appointments ordered by date, then start time.
    async fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError>;

    /// `appointments` joined with patient and payment, same filter and order.
    async fn appointment_records(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, AppointmentError>;

    async fn patient(&self, patient_id: Uuid) -> Result<Option<Patient>, AppointmentError>;

    /// Lookup by normalized email, credential hash included.
    async fn patient_by_email(&self, email: &str) -> Result<Option<Patient>, AppointmentError>;

    async fn payment_for(&self, appointment_id: Uuid) -> Result<Option<Payment>, AppointmentError>;

    async fn payment_attempts(&self, appointment_id: Uuid) -> Result<Vec<PaymentAttempt>, AppointmentError>;

    async fn submit_payment(
        &self,
        appointment_id: Uuid,
        details: ManualPaymentDetails,
    ) -> Result<Payment, AppointmentError>;

    async fn verify_payment(
        &self,
        appointment_id: Uuid,
        decision: VerificationDecision,
        notes: Option<String>,
    ) -> Result<VerifiedPayment, AppointmentError>;

    async fn transition(&self, appointment_id: Uuid, to: AppointmentStatus) -> Result<Appointment, AppointmentError>;

    async fn set_meeting_link(&self, appointment_id: Uuid, link: String) -> Result<Appointment, AppointmentError>;

    async fn audit_trail(&self, appointment_id: Uuid) -> Result<Vec<AuditEntry>, AppointmentError>;
}

/// Payment note stored when a payment is rejected.
pub(crate) fn rejection_note(notes: Option<&str>) -> String {
    match notes {
        Some(notes) if !notes.trim().is_empty() => format!("Rejected: {}", notes.trim()),
        _ => "Payment rejected".to_string(),
    }
}
