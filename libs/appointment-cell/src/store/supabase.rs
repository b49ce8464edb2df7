// libs/appointment-cell/src/store/supabase.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use availability_cell::{
    AvailabilityError, BookedRange, DateException, NewDateException, NewWeeklyRule, ScheduleStore, WeeklyRule,
};
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::{AppointmentStatus, ClinicService};
use shared_utils::time_format::{format_clock_time, hhmm, hhmm_option};

use crate::models::{
    AdmissionReceipt, Appointment, AppointmentError, AppointmentFilter, AuditAction, AuditEntry, IdentityPolicy,
    ManualPaymentDetails, Patient, Payment, PaymentAttempt, PaymentMethod, PaymentStatus, VerificationDecision,
};
use crate::store::{Admission, AppointmentRecord, BookingStore, VerifiedPayment};

// Messages raised by the database functions in supabase/migrations.
const SLOT_CONFLICT: &str = "slot_conflict";
const SERVICE_NOT_FOUND: &str = "service_not_found";
const APPOINTMENT_NOT_FOUND: &str = "appointment_not_found";
const PAYMENT_NOT_FOUND: &str = "payment_not_found";
const INVALID_TRANSITION: &str = "invalid_transition";
const APPOINTMENT_CLOSED: &str = "appointment_closed";

// PostgreSQL unique_violation
const UNIQUE_VIOLATION: &str = "23505";

// ==============================================================================
// ROW TYPES
// ==============================================================================

#[derive(Debug, Deserialize)]
struct ServiceRow {
    id: Uuid,
    name: String,
    fee: i64,
    duration_minutes: u32,
}

impl From<ServiceRow> for ClinicService {
    fn from(row: ServiceRow) -> Self {
        ClinicService { id: row.id, name: row.name, fee: row.fee, duration_minutes: row.duration_minutes }
    }
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    id: Uuid,
    day_of_week: u8,
    #[serde(with = "hhmm")]
    start_time: NaiveTime,
    #[serde(with = "hhmm")]
    end_time: NaiveTime,
}

impl From<RuleRow> for WeeklyRule {
    fn from(row: RuleRow) -> Self {
        WeeklyRule { id: row.id, day_of_week: row.day_of_week, start_time: row.start_time, end_time: row.end_time }
    }
}

#[derive(Debug, Deserialize)]
struct ExceptionRow {
    id: Uuid,
    date: NaiveDate,
    is_available: bool,
    #[serde(default, with = "hhmm_option")]
    start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option")]
    end_time: Option<NaiveTime>,
    #[serde(default)]
    reason: Option<String>,
}

impl From<ExceptionRow> for DateException {
    fn from(row: ExceptionRow) -> Self {
        DateException {
            id: row.id,
            date: row.date,
            is_available: row.is_available,
            start_time: row.start_time,
            end_time: row.end_time,
            reason: row.reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BookedRow {
    #[serde(with = "hhmm")]
    start_time: NaiveTime,
    #[serde(with = "hhmm")]
    end_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
struct AppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    service_id: Uuid,
    date: NaiveDate,
    #[serde(with = "hhmm")]
    start_time: NaiveTime,
    #[serde(with = "hhmm")]
    end_time: NaiveTime,
    #[serde(default)]
    problem: Option<String>,
    status: AppointmentStatus,
    #[serde(default)]
    meeting_link: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Appointment {
            id: row.id,
            patient_id: row.patient_id,
            service_id: row.service_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            problem: row.problem,
            status: row.status,
            meeting_link: row.meeting_link,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    #[serde(default)]
    credential_hash: String,
    created_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Patient {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            credential_hash: row.credential_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentRow {
    id: Uuid,
    appointment_id: Uuid,
    amount: i64,
    method: PaymentMethod,
    status: PaymentStatus,
    #[serde(default)]
    sender_number: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            appointment_id: row.appointment_id,
            amount: row.amount,
            method: row.method,
            status: row.status,
            sender_number: row.sender_number,
            transaction_id: row.transaction_id,
            notes: row.notes,
            verified_at: row.verified_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AttemptRow {
    id: Uuid,
    payment_id: Uuid,
    method: PaymentMethod,
    sender_number: String,
    transaction_id: String,
    #[serde(default)]
    notes: Option<String>,
    status: PaymentStatus,
    created_at: DateTime<Utc>,
}

impl From<AttemptRow> for PaymentAttempt {
    fn from(row: AttemptRow) -> Self {
        PaymentAttempt {
            id: row.id,
            payment_id: row.payment_id,
            method: row.method,
            sender_number: row.sender_number,
            transaction_id: row.transaction_id,
            notes: row.notes,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuditRow {
    id: Uuid,
    appointment_id: Uuid,
    action: AuditAction,
    #[serde(default)]
    details: Value,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        AuditEntry {
            id: row.id,
            appointment_id: row.appointment_id,
            action: row.action,
            details: row.details,
            at: row.created_at,
        }
    }
}

/// PostgREST embeds a one-to-one relation as an object, older servers as a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Embedded<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Embedded<T> {
    fn into_first(self) -> Option<T> {
        match self {
            Embedded::One(row) => Some(row),
            Embedded::Many(rows) => rows.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppointmentRecordRow {
    #[serde(flatten)]
    appointment: AppointmentRow,
    #[serde(default)]
    patient: Option<PatientRow>,
    #[serde(default)]
    payment: Option<Embedded<PaymentRow>>,
}

impl From<AppointmentRecordRow> for AppointmentRecord {
    fn from(row: AppointmentRecordRow) -> Self {
        AppointmentRecord {
            appointment: row.appointment.into(),
            patient: row.patient.map(Into::into),
            payment: row.payment.and_then(Embedded::into_first).map(Into::into),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdmissionRow {
    appointment_id: Uuid,
    patient_id: Uuid,
    resumed: bool,
    new_patient: bool,
    credential_updated: bool,
}

// ==============================================================================
// STORE
// ==============================================================================

/// Store backed by Supabase. Reads go through PostgREST; multi-row writes call
/// database functions so each one commits as a single transaction.
pub struct SupabaseClinicStore {
    supabase: SupabaseClient,
}

impl SupabaseClinicStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: SupabaseClient::new(config) }
    }

    async fn select<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, SupabaseError> {
        self.supabase.request(Method::GET, path, None, None).await
    }

    async fn first<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>, SupabaseError> {
        let rows: Vec<T> = self.select(path).await?;
        Ok(rows.into_iter().next())
    }

    async fn current_status(&self, appointment_id: Uuid) -> Option<AppointmentStatus> {
        match BookingStore::appointment(self, appointment_id).await {
            Ok(appointment) => appointment.map(|appointment| appointment.status),
            Err(e) => {
                warn!("Could not read appointment {} while mapping an error: {}", appointment_id, e);
                None
            }
        }
    }

    /// Turns a failed write into the matching domain error. `to` is the status the write aimed for.
    async fn write_error(&self, error: SupabaseError, appointment_id: Uuid, to: AppointmentStatus) -> AppointmentError {
        if error.is_raised(INVALID_TRANSITION) {
            return match self.current_status(appointment_id).await {
                Some(from) => AppointmentError::InvalidStatusTransition { from, to },
                None => AppointmentError::NotFound("Appointment".to_string()),
            };
        }
        if error.is_raised(APPOINTMENT_CLOSED) {
            return match self.current_status(appointment_id).await {
                Some(status) => AppointmentError::Closed(status),
                None => AppointmentError::NotFound("Appointment".to_string()),
            };
        }
        booking_error(error)
    }
}

fn booking_error(error: SupabaseError) -> AppointmentError {
    if error.is_raised(SLOT_CONFLICT) {
        AppointmentError::SlotConflict
    } else if error.is_raised(SERVICE_NOT_FOUND) {
        AppointmentError::NotFound("Service".to_string())
    } else if error.is_raised(APPOINTMENT_NOT_FOUND) {
        AppointmentError::NotFound("Appointment".to_string())
    } else if error.is_raised(PAYMENT_NOT_FOUND) {
        AppointmentError::NotFound("Payment".to_string())
    } else {
        AppointmentError::Store(error.to_string())
    }
}

fn schedule_error(error: SupabaseError) -> AvailabilityError {
    match &error {
        SupabaseError::Api { code: Some(code), .. } if code == UNIQUE_VIOLATION => {
            AvailabilityError::Conflict("An exception already exists for this date".to_string())
        }
        _ => AvailabilityError::Store(error.to_string()),
    }
}

fn appointments_path(select: &str, filter: &AppointmentFilter) -> String {
    let mut path = format!(
        "/rest/v1/appointments?select={}&order=date.asc,start_time.asc,created_at.asc",
        select
    );
    if let Some(status) = filter.status {
        path.push_str(&format!("&status=eq.{}", status.as_str()));
    }
    if let Some(date) = filter.date {
        path.push_str(&format!("&date=eq.{}", date));
    }
    if let Some(from) = filter.from_date {
        path.push_str(&format!("&date=gte.{}", from));
    }
    if let Some(to) = filter.to_date {
        path.push_str(&format!("&date=lte.{}", to));
    }
    if let Some(patient_id) = filter.patient_id {
        path.push_str(&format!("&patient_id=eq.{}", patient_id));
    }
    path
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses.iter().map(AppointmentStatus::as_str).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl ScheduleStore for SupabaseClinicStore {
    async fn services(&self) -> Result<Vec<ClinicService>, AvailabilityError> {
        let rows: Vec<ServiceRow> = self
            .select("/rest/v1/services?select=*&order=fee.asc")
            .await
            .map_err(schedule_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn service(&self, service_id: Uuid) -> Result<Option<ClinicService>, AvailabilityError> {
        let row: Option<ServiceRow> = self
            .first(&format!("/rest/v1/services?id=eq.{}", service_id))
            .await
            .map_err(schedule_error)?;
        Ok(row.map(Into::into))
    }

    async fn weekly_rules(&self) -> Result<Vec<WeeklyRule>, AvailabilityError> {
        let rows: Vec<RuleRow> = self
            .select("/rest/v1/availability_rules?select=*&order=day_of_week.asc,start_time.asc")
            .await
            .map_err(schedule_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn replace_weekly_rules(&self, rules: Vec<NewWeeklyRule>) -> Result<Vec<WeeklyRule>, AvailabilityError> {
        let payload: Vec<Value> = rules
            .iter()
            .map(|rule| {
                json!({
                    "day_of_week": rule.day_of_week,
                    "start_time": format_clock_time(rule.start_time),
                    "end_time": format_clock_time(rule.end_time),
                })
            })
            .collect();

        let rows: Vec<RuleRow> = self
            .supabase
            .rpc("replace_availability_rules", json!({ "p_rules": payload }))
            .await
            .map_err(schedule_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn exceptions(&self) -> Result<Vec<DateException>, AvailabilityError> {
        let rows: Vec<ExceptionRow> = self
            .select("/rest/v1/availability_exceptions?select=*&order=date.asc")
            .await
            .map_err(schedule_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn exceptions_on(&self, date: NaiveDate) -> Result<Vec<DateException>, AvailabilityError> {
        let rows: Vec<ExceptionRow> = self
            .select(&format!("/rest/v1/availability_exceptions?date=eq.{}", date))
            .await
            .map_err(schedule_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_exception(&self, exception: NewDateException) -> Result<DateException, AvailabilityError> {
        let body = json!({
            "date": exception.date,
            "is_available": exception.is_available,
            "start_time": exception.start_time.map(format_clock_time),
            "end_time": exception.end_time.map(format_clock_time),
            "reason": exception.reason,
        });

        let rows: Vec<ExceptionRow> = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/availability_exceptions", body)
            .await
            .map_err(schedule_error)?;

        rows.into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| AvailabilityError::Store("Exception insert returned no row".to_string()))
    }

    async fn delete_exception(&self, exception_id: Uuid) -> Result<(), AvailabilityError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let rows: Vec<ExceptionRow> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &format!("/rest/v1/availability_exceptions?id=eq.{}", exception_id),
                None,
                None,
                Some(headers),
            )
            .await
            .map_err(schedule_error)?;

        if rows.is_empty() {
            return Err(AvailabilityError::NotFound("Exception".to_string()));
        }
        Ok(())
    }

    async fn booked_ranges(
        &self,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<BookedRange>, AvailabilityError> {
        let path = format!(
            "/rest/v1/appointments?select=start_time,end_time&date=eq.{}&status=in.({})",
            date,
            status_list(statuses)
        );
        let rows: Vec<BookedRow> = self.select(&path).await.map_err(schedule_error)?;
        Ok(rows
            .into_iter()
            .map(|row| BookedRange { start_time: row.start_time, end_time: row.end_time })
            .collect())
    }
}

#[async_trait]
impl BookingStore for SupabaseClinicStore {
    async fn admit(&self, admission: Admission) -> Result<AdmissionReceipt, AppointmentError> {
        debug!("Calling admit_booking for {} {}", admission.date, admission.start_time);

        let args = json!({
            "p_service_id": admission.service_id,
            "p_date": admission.date,
            "p_start_time": format_clock_time(admission.start_time),
            "p_end_time": format_clock_time(admission.end_time),
            "p_problem": admission.problem,
            "p_name": admission.name,
            "p_email": admission.email,
            "p_phone": admission.phone,
            "p_credential_hash": admission.credential_hash,
            "p_credential_supplied": admission.credential_supplied,
            "p_claim_by_email": admission.policy == IdentityPolicy::ClaimByEmail,
            "p_draft_id": admission.draft_id,
        });

        let row: AdmissionRow = match self.supabase.rpc("admit_booking", args).await {
            Ok(row) => row,
            Err(e) => {
                return Err(match admission.draft_id {
                    Some(draft_id) => self.write_error(e, draft_id, AppointmentStatus::PendingPayment).await,
                    None => booking_error(e),
                })
            }
        };

        Ok(AdmissionReceipt {
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            resumed: row.resumed,
            new_patient: row.new_patient,
            credential_updated: row.credential_updated,
        })
    }

    async fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let row: Option<AppointmentRow> = self
            .first(&format!("/rest/v1/appointments?id=eq.{}", appointment_id))
            .await
            .map_err(booking_error)?;
        Ok(row.map(Into::into))
    }

    async fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<AppointmentRow> = self
            .select(&appointments_path("*", filter))
            .await
            .map_err(booking_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn appointment_records(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, AppointmentError> {
        let path = appointments_path("*,patient:patients(*),payment:payments(*)", filter);
        let rows: Vec<AppointmentRecordRow> = self.select(&path).await.map_err(booking_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn patient(&self, patient_id: Uuid) -> Result<Option<Patient>, AppointmentError> {
        let row: Option<PatientRow> = self
            .first(&format!("/rest/v1/patients?id=eq.{}", patient_id))
            .await
            .map_err(booking_error)?;
        Ok(row.map(Into::into))
    }

    async fn patient_by_email(&self, email: &str) -> Result<Option<Patient>, AppointmentError> {
        let row: Option<PatientRow> = self
            .first(&format!("/rest/v1/patients?email=eq.{}", urlencoding::encode(email)))
            .await
            .map_err(booking_error)?;
        Ok(row.map(Into::into))
    }

    async fn payment_for(&self, appointment_id: Uuid) -> Result<Option<Payment>, AppointmentError> {
        let row: Option<PaymentRow> = self
            .first(&format!("/rest/v1/payments?appointment_id=eq.{}", appointment_id))
            .await
            .map_err(booking_error)?;
        Ok(row.map(Into::into))
    }

    async fn payment_attempts(&self, appointment_id: Uuid) -> Result<Vec<PaymentAttempt>, AppointmentError> {
        let Some(payment) = self.payment_for(appointment_id).await? else {
            return Ok(Vec::new());
        };

        let rows: Vec<AttemptRow> = self
            .select(&format!(
                "/rest/v1/payment_attempts?payment_id=eq.{}&order=created_at.asc",
                payment.id
            ))
            .await
            .map_err(booking_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn submit_payment(
        &self,
        appointment_id: Uuid,
        details: ManualPaymentDetails,
    ) -> Result<Payment, AppointmentError> {
        let args = json!({
            "p_appointment_id": appointment_id,
            "p_method": details.method.as_str(),
            "p_sender_number": details.sender_number,
            "p_transaction_id": details.transaction_id,
            "p_notes": details.notes,
        });

        match self.supabase.rpc::<PaymentRow>("submit_manual_payment", args).await {
            Ok(row) => Ok(row.into()),
            Err(e) => Err(self.write_error(e, appointment_id, AppointmentStatus::PendingVerification).await),
        }
    }

    async fn verify_payment(
        &self,
        appointment_id: Uuid,
        decision: VerificationDecision,
        notes: Option<String>,
    ) -> Result<VerifiedPayment, AppointmentError> {
        let to = match decision {
            VerificationDecision::Approve => AppointmentStatus::Confirmed,
            VerificationDecision::Reject => AppointmentStatus::PendingPayment,
        };
        let args = json!({
            "p_appointment_id": appointment_id,
            "p_decision": decision,
            "p_notes": notes,
        });

        let payment: Payment = match self.supabase.rpc::<PaymentRow>("verify_manual_payment", args).await {
            Ok(row) => row.into(),
            Err(e) => return Err(self.write_error(e, appointment_id, to).await),
        };

        let appointment = BookingStore::appointment(self, appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))?;
        let patient = self
            .patient(appointment.patient_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Patient".to_string()))?;

        Ok(VerifiedPayment { appointment, patient, payment })
    }

    async fn transition(&self, appointment_id: Uuid, to: AppointmentStatus) -> Result<Appointment, AppointmentError> {
        let args = json!({
            "p_appointment_id": appointment_id,
            "p_to": to.as_str(),
        });

        match self.supabase.rpc::<AppointmentRow>("transition_appointment", args).await {
            Ok(row) => Ok(row.into()),
            Err(e) => Err(self.write_error(e, appointment_id, to).await),
        }
    }

    async fn set_meeting_link(&self, appointment_id: Uuid, link: String) -> Result<Appointment, AppointmentError> {
        let args = json!({
            "p_appointment_id": appointment_id,
            "p_link": link,
        });

        match self.supabase.rpc::<AppointmentRow>("set_meeting_link", args).await {
            Ok(row) => Ok(row.into()),
            Err(e) => Err(self.write_error(e, appointment_id, AppointmentStatus::Confirmed).await),
        }
    }

    async fn audit_trail(&self, appointment_id: Uuid) -> Result<Vec<AuditEntry>, AppointmentError> {
        let rows: Vec<AuditRow> = self
            .select(&format!(
                "/rest/v1/audit_logs?appointment_id=eq.{}&order=created_at.asc",
                appointment_id
            ))
            .await
            .map_err(booking_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
