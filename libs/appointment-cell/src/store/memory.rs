// libs/appointment-cell/src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::{
    AvailabilityError, BookedRange, DateException, NewDateException, NewWeeklyRule, ScheduleStore, WeeklyRule,
};
use shared_models::{AppointmentStatus, ClinicService};

use crate::models::{
    AdmissionReceipt, Appointment, AppointmentError, AppointmentFilter, AuditAction, AuditEntry, ManualPaymentDetails,
    Patient, Payment, PaymentAttempt, PaymentMethod, PaymentStatus, VerificationDecision, IdentityPolicy,
};
use crate::store::{rejection_note, Admission, AppointmentRecord, BookingStore, VerifiedPayment};

/// All clinic data held by the in-memory store.
#[derive(Debug, Default)]
pub struct ClinicLedger {
    pub services: Vec<ClinicService>,
    pub weekly_rules: Vec<WeeklyRule>,
    pub exceptions: Vec<DateException>,
    pub patients: HashMap<Uuid, Patient>,
    pub appointments: HashMap<Uuid, Appointment>,
    pub payments: HashMap<Uuid, Payment>,
    pub attempts: Vec<PaymentAttempt>,
    pub audit: Vec<AuditEntry>,
}

impl ClinicLedger {
    /// Three 30-minute services and Sunday to Thursday evening hours.
    pub fn demo() -> Self {
        let services = [("Online Consultation", 500), ("Chamber Visit", 1000), ("Follow-up", 300)]
            .into_iter()
            .map(|(name, fee)| ClinicService {
                id: Uuid::new_v4(),
                name: name.to_string(),
                fee,
                duration_minutes: 30,
            })
            .collect();

        let weekly_rules = match (NaiveTime::from_hms_opt(19, 0, 0), NaiveTime::from_hms_opt(22, 0, 0)) {
            (Some(start_time), Some(end_time)) => (0..=4)
                .map(|day_of_week| WeeklyRule { id: Uuid::new_v4(), day_of_week, start_time, end_time })
                .collect(),
            _ => Vec::new(),
        };

        Self { services, weekly_rules, ..Self::default() }
    }

    fn payment_of(&self, appointment_id: Uuid) -> Option<&Payment> {
        self.payments.values().find(|payment| payment.appointment_id == appointment_id)
    }

    fn payment_of_mut(&mut self, appointment_id: Uuid) -> Option<&mut Payment> {
        self.payments.values_mut().find(|payment| payment.appointment_id == appointment_id)
    }

    /// Appointments passing `filter`, ordered by date, start time, then creation.
    fn matching(&self, filter: &AppointmentFilter) -> Vec<&Appointment> {
        let mut appointments: Vec<&Appointment> = self
            .appointments
            .values()
            .filter(|appointment| filter.matches(appointment))
            .collect();
        appointments.sort_by_key(|appointment| (appointment.date, appointment.start_time, appointment.created_at));
        appointments
    }

    fn patient_by_email(&self, email: &str) -> Option<&Patient> {
        self.patients.values().find(|patient| patient.email == email)
    }

    fn record(&mut self, appointment_id: Uuid, action: AuditAction, details: Value) {
        self.audit.push(AuditEntry {
            id: Uuid::new_v4(),
            appointment_id,
            action,
            details,
            at: Utc::now(),
        });
    }

    /// A draft resumes only for the patient who owns it.
    fn resumable_draft(&self, draft_id: Option<Uuid>, email: &str) -> Result<Option<Uuid>, AppointmentError> {
        let Some(draft) = draft_id.and_then(|id| self.appointments.get(&id)) else {
            return Ok(None);
        };

        let owned = self
            .patients
            .get(&draft.patient_id)
            .is_some_and(|patient| patient.email == email);
        if !owned {
            debug!("Draft {} belongs to another patient, booking a new appointment", draft.id);
            return Ok(None);
        }

        if draft.status != AppointmentStatus::PendingPayment {
            return Err(AppointmentError::Closed(draft.status));
        }

        Ok(Some(draft.id))
    }
}

/// Single-process store. One lock guards the whole ledger, so every operation
/// runs as one critical section and check-then-write sequences cannot interleave.
pub struct MemoryClinicStore {
    ledger: Mutex<ClinicLedger>,
}

impl MemoryClinicStore {
    pub fn new() -> Self {
        Self { ledger: Mutex::new(ClinicLedger::default()) }
    }

    pub fn with_ledger(ledger: ClinicLedger) -> Self {
        Self { ledger: Mutex::new(ledger) }
    }

    pub fn with_demo_data() -> Self {
        info!("Seeding in-memory store with demo services and weekly hours");
        Self::with_ledger(ClinicLedger::demo())
    }

    /// Read-only view of the ledger, mainly for tests and diagnostics.
    pub async fn inspect<R>(&self, read: impl FnOnce(&ClinicLedger) -> R) -> R {
        let ledger = self.ledger.lock().await;
        read(&ledger)
    }
}

impl Default for MemoryClinicStore {
    fn default() -> Self {
        Self::new()
    }
}

// ==============================================================================
// SCHEDULE
// ==============================================================================

#[async_trait]
impl ScheduleStore for MemoryClinicStore {
    async fn services(&self) -> Result<Vec<ClinicService>, AvailabilityError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.services.clone())
    }

    async fn service(&self, service_id: Uuid) -> Result<Option<ClinicService>, AvailabilityError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.services.iter().find(|service| service.id == service_id).cloned())
    }

    async fn weekly_rules(&self) -> Result<Vec<WeeklyRule>, AvailabilityError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.weekly_rules.clone())
    }

    async fn replace_weekly_rules(&self, rules: Vec<NewWeeklyRule>) -> Result<Vec<WeeklyRule>, AvailabilityError> {
        let mut ledger = self.ledger.lock().await;
        ledger.weekly_rules = rules.into_iter().map(|rule| rule.into_rule(Uuid::new_v4())).collect();
        Ok(ledger.weekly_rules.clone())
    }

    async fn exceptions(&self) -> Result<Vec<DateException>, AvailabilityError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.exceptions.clone())
    }

    async fn exceptions_on(&self, date: NaiveDate) -> Result<Vec<DateException>, AvailabilityError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.exceptions.iter().filter(|exception| exception.date == date).cloned().collect())
    }

    async fn add_exception(&self, exception: NewDateException) -> Result<DateException, AvailabilityError> {
        let mut ledger = self.ledger.lock().await;
        if ledger.exceptions.iter().any(|existing| existing.date == exception.date) {
            return Err(AvailabilityError::Conflict(format!(
                "An exception already exists for {}",
                exception.date
            )));
        }

        let saved = exception.into_exception(Uuid::new_v4());
        ledger.exceptions.push(saved.clone());
        Ok(saved)
    }

    async fn delete_exception(&self, exception_id: Uuid) -> Result<(), AvailabilityError> {
        let mut ledger = self.ledger.lock().await;
        let before = ledger.exceptions.len();
        ledger.exceptions.retain(|exception| exception.id != exception_id);
        if ledger.exceptions.len() == before {
            return Err(AvailabilityError::NotFound("Exception".to_string()));
        }
        Ok(())
    }

    async fn booked_ranges(
        &self,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<BookedRange>, AvailabilityError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .appointments
            .values()
            .filter(|appointment| appointment.date == date && statuses.contains(&appointment.status))
            .map(|appointment| BookedRange {
                start_time: appointment.start_time,
                end_time: appointment.end_time,
            })
            .collect())
    }
}

// ==============================================================================
// BOOKINGS
// ==============================================================================

#[async_trait]
impl BookingStore for MemoryClinicStore {
    async fn admit(&self, admission: Admission) -> Result<AdmissionReceipt, AppointmentError> {
        let mut ledger = self.ledger.lock().await;
        let now = Utc::now();

        let fee = ledger
            .services
            .iter()
            .find(|service| service.id == admission.service_id)
            .map(|service| service.fee)
            .ok_or_else(|| AppointmentError::NotFound("Service".to_string()))?;

        let draft_id = ledger.resumable_draft(admission.draft_id, &admission.email)?;

        let taken = ledger.appointments.values().any(|appointment| {
            Some(appointment.id) != draft_id
                && appointment.date == admission.date
                && appointment.start_time == admission.start_time
                && appointment.status.holds_slot_for_admission()
        });
        if taken {
            warn!("Slot {} {} already held, rejecting admission", admission.date, admission.start_time);
            return Err(AppointmentError::SlotConflict);
        }

        // Checks are done; everything below only writes.
        let existing_patient = ledger.patient_by_email(&admission.email).map(|patient| patient.id);
        let (patient_id, new_patient, credential_updated) = match existing_patient {
            Some(patient_id) => {
                let claim = admission.policy == IdentityPolicy::ClaimByEmail && admission.credential_supplied;
                if claim {
                    if let Some(patient) = ledger.patients.get_mut(&patient_id) {
                        patient.credential_hash = admission.credential_hash.clone();
                    }
                }
                (patient_id, false, claim)
            }
            None => {
                let patient = Patient {
                    id: Uuid::new_v4(),
                    name: admission.name.clone(),
                    email: admission.email.clone(),
                    phone: admission.phone.clone(),
                    credential_hash: admission.credential_hash.clone(),
                    created_at: now,
                };
                let patient_id = patient.id;
                ledger.patients.insert(patient_id, patient);
                (patient_id, true, false)
            }
        };

        let appointment_id = match draft_id {
            Some(draft_id) => {
                if let Some(draft) = ledger.appointments.get_mut(&draft_id) {
                    draft.service_id = admission.service_id;
                    draft.date = admission.date;
                    draft.start_time = admission.start_time;
                    draft.end_time = admission.end_time;
                    draft.problem = admission.problem.clone();
                    draft.updated_at = now;
                }
                if let Some(payment) = ledger.payment_of_mut(draft_id) {
                    payment.amount = fee;
                }
                draft_id
            }
            None => {
                let appointment = Appointment {
                    id: Uuid::new_v4(),
                    patient_id,
                    service_id: admission.service_id,
                    date: admission.date,
                    start_time: admission.start_time,
                    end_time: admission.end_time,
                    problem: admission.problem.clone(),
                    status: AppointmentStatus::PendingPayment,
                    meeting_link: None,
                    created_at: now,
                    updated_at: now,
                };
                let appointment_id = appointment.id;
                ledger.appointments.insert(appointment_id, appointment);

                let payment = Payment {
                    id: Uuid::new_v4(),
                    appointment_id,
                    amount: fee,
                    method: PaymentMethod::default(),
                    status: PaymentStatus::Initiated,
                    sender_number: None,
                    transaction_id: None,
                    notes: None,
                    verified_at: None,
                    created_at: now,
                };
                ledger.payments.insert(payment.id, payment);
                appointment_id
            }
        };

        Ok(AdmissionReceipt {
            appointment_id,
            patient_id,
            resumed: draft_id.is_some(),
            new_patient,
            credential_updated,
        })
    }

    async fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.appointments.get(&appointment_id).cloned())
    }

    async fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.matching(filter).into_iter().cloned().collect())
    }

    async fn appointment_records(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .matching(filter)
            .into_iter()
            .map(|appointment| AppointmentRecord {
                appointment: appointment.clone(),
                patient: ledger.patients.get(&appointment.patient_id).cloned(),
                payment: ledger.payment_of(appointment.id).cloned(),
            })
            .collect())
    }

    async fn patient(&self, patient_id: Uuid) -> Result<Option<Patient>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.patients.get(&patient_id).cloned())
    }

    async fn patient_by_email(&self, email: &str) -> Result<Option<Patient>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.patient_by_email(email).cloned())
    }

    async fn payment_for(&self, appointment_id: Uuid) -> Result<Option<Payment>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.payment_of(appointment_id).cloned())
    }

    async fn payment_attempts(&self, appointment_id: Uuid) -> Result<Vec<PaymentAttempt>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        let Some(payment_id) = ledger.payment_of(appointment_id).map(|payment| payment.id) else {
            return Ok(Vec::new());
        };
        Ok(ledger.attempts.iter().filter(|attempt| attempt.payment_id == payment_id).cloned().collect())
    }

    async fn submit_payment(
        &self,
        appointment_id: Uuid,
        details: ManualPaymentDetails,
    ) -> Result<Payment, AppointmentError> {
        let mut ledger = self.ledger.lock().await;
        let now = Utc::now();

        let status = ledger
            .appointments
            .get(&appointment_id)
            .map(|appointment| appointment.status)
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))?;
        let payment_id = ledger
            .payment_of(appointment_id)
            .map(|payment| payment.id)
            .ok_or_else(|| AppointmentError::NotFound("Payment".to_string()))?;

        let next = AppointmentStatus::PendingVerification;
        if !status.can_transition_to(next) {
            return Err(AppointmentError::InvalidStatusTransition { from: status, to: next });
        }

        ledger.attempts.push(PaymentAttempt {
            id: Uuid::new_v4(),
            payment_id,
            method: details.method,
            sender_number: details.sender_number.clone(),
            transaction_id: details.transaction_id.clone(),
            notes: details.notes.clone(),
            status: PaymentStatus::PendingVerification,
            created_at: now,
        });

        let payment = match ledger.payments.get_mut(&payment_id) {
            Some(payment) => {
                payment.method = details.method;
                payment.sender_number = Some(details.sender_number.clone());
                payment.transaction_id = Some(details.transaction_id.clone());
                payment.notes = details.notes.clone();
                payment.status = PaymentStatus::PendingVerification;
                payment.clone()
            }
            None => return Err(AppointmentError::NotFound("Payment".to_string())),
        };

        if let Some(appointment) = ledger.appointments.get_mut(&appointment_id) {
            appointment.status = next;
            appointment.updated_at = now;
        }

        ledger.record(
            appointment_id,
            AuditAction::PaymentSubmitted,
            json!({ "method": details.method, "transactionId": details.transaction_id }),
        );

        Ok(payment)
    }

    async fn verify_payment(
        &self,
        appointment_id: Uuid,
        decision: VerificationDecision,
        notes: Option<String>,
    ) -> Result<VerifiedPayment, AppointmentError> {
        let mut ledger = self.ledger.lock().await;
        let now = Utc::now();

        let (status, patient_id) = ledger
            .appointments
            .get(&appointment_id)
            .map(|appointment| (appointment.status, appointment.patient_id))
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))?;
        let patient = ledger
            .patients
            .get(&patient_id)
            .cloned()
            .ok_or_else(|| AppointmentError::NotFound("Patient".to_string()))?;
        if ledger.payment_of(appointment_id).is_none() {
            return Err(AppointmentError::NotFound("Payment".to_string()));
        }

        let (next, action) = match decision {
            VerificationDecision::Approve => (AppointmentStatus::Confirmed, AuditAction::PaymentApproved),
            VerificationDecision::Reject => (AppointmentStatus::PendingPayment, AuditAction::PaymentRejected),
        };
        if !status.can_transition_to(next) {
            return Err(AppointmentError::InvalidStatusTransition { from: status, to: next });
        }

        let payment = match ledger.payment_of_mut(appointment_id) {
            Some(payment) => {
                match decision {
                    VerificationDecision::Approve => {
                        payment.status = PaymentStatus::Paid;
                        payment.verified_at = Some(now);
                    }
                    VerificationDecision::Reject => {
                        payment.status = PaymentStatus::Rejected;
                        payment.notes = Some(rejection_note(notes.as_deref()));
                    }
                }
                payment.clone()
            }
            None => return Err(AppointmentError::NotFound("Payment".to_string())),
        };

        let appointment = match ledger.appointments.get_mut(&appointment_id) {
            Some(appointment) => {
                appointment.status = next;
                appointment.updated_at = now;
                appointment.clone()
            }
            None => return Err(AppointmentError::NotFound("Appointment".to_string())),
        };

        ledger.record(appointment_id, action, json!({ "notes": notes }));

        Ok(VerifiedPayment { appointment, patient, payment })
    }

    async fn transition(&self, appointment_id: Uuid, to: AppointmentStatus) -> Result<Appointment, AppointmentError> {
        let mut ledger = self.ledger.lock().await;

        let (appointment, from) = match ledger.appointments.get_mut(&appointment_id) {
            Some(appointment) => {
                let from = appointment.status;
                if !from.can_transition_to(to) {
                    return Err(AppointmentError::InvalidStatusTransition { from, to });
                }
                appointment.status = to;
                appointment.updated_at = Utc::now();
                (appointment.clone(), from)
            }
            None => return Err(AppointmentError::NotFound("Appointment".to_string())),
        };

        ledger.record(appointment_id, AuditAction::StatusChange, json!({ "from": from, "to": to }));
        Ok(appointment)
    }

    async fn set_meeting_link(&self, appointment_id: Uuid, link: String) -> Result<Appointment, AppointmentError> {
        let mut ledger = self.ledger.lock().await;

        let appointment = match ledger.appointments.get_mut(&appointment_id) {
            Some(appointment) if appointment.status.is_terminal() => {
                return Err(AppointmentError::Closed(appointment.status));
            }
            Some(appointment) => {
                appointment.meeting_link = Some(link.clone());
                appointment.updated_at = Utc::now();
                appointment.clone()
            }
            None => return Err(AppointmentError::NotFound("Appointment".to_string())),
        };

        ledger.record(appointment_id, AuditAction::MeetingLinkProvided, json!({ "link": link }));
        Ok(appointment)
    }

    async fn audit_trail(&self, appointment_id: Uuid) -> Result<Vec<AuditEntry>, AppointmentError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.audit.iter().filter(|entry| entry.appointment_id == appointment_id).cloned().collect())
    }
}
