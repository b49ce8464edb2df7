// libs/appointment-cell/tests/workflow_test.rs
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use serde_json::json;
use uuid::Uuid;

use appointment_cell::services::notification::NotificationError;
use appointment_cell::services::{
    AdmissionService, ConsoleService, CredentialHasher, LifecycleService, Notifier, PaymentService,
    TelemedicineProvider,
};
use appointment_cell::{
    AppointmentError, AppointmentFilter, AuditAction, BookingRequest, BookingStore, IdentityPolicy,
    ManualPaymentDetails, MemoryClinicStore, PaymentMethod, PaymentStatus, VerificationDecision,
};
use shared_models::{AppointmentStatus, ClinicService};

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

#[derive(Default)]
struct RecordingNotifier {
    emails: Mutex<Vec<(String, String)>>,
    sms: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn subjects(&self) -> Vec<String> {
        self.emails.lock().unwrap().iter().map(|(_, subject)| subject.clone()).collect()
    }

    /// Notifications are dispatched in the background; wait until `count` emails arrived.
    async fn wait_for_emails(&self, count: usize) {
        for _ in 0..100 {
            if self.emails.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, _html: &str) -> Result<(), NotificationError> {
        self.emails.lock().unwrap().push((to.to_string(), subject.to_string()));
        Ok(())
    }

    async fn send_sms(&self, to: &str, message: &str) -> Result<(), NotificationError> {
        self.sms.lock().unwrap().push((to.to_string(), message.to_string()));
        Ok(())
    }
}

struct Clinic {
    store: Arc<MemoryClinicStore>,
    notifier: Arc<RecordingNotifier>,
    service: ClinicService,
}

impl Clinic {
    async fn new() -> Self {
        let store = Arc::new(MemoryClinicStore::with_demo_data());
        let service = store.inspect(|ledger| ledger.services[0].clone()).await;
        Self { store, notifier: Arc::new(RecordingNotifier::default()), service }
    }

    fn payments(&self) -> PaymentService {
        PaymentService::new(self.store.clone(), self.notifier.clone())
    }

    fn lifecycle(&self) -> LifecycleService {
        LifecycleService::new(
            self.store.clone(),
            self.notifier.clone(),
            TelemedicineProvider::with_config("https://meet.jit.si", "clinic"),
        )
    }

    fn console(&self) -> ConsoleService {
        ConsoleService::new(self.store.clone(), self.store.clone())
    }

    async fn book(&self, date: &str, start: &str, end: &str) -> Uuid {
        let admission = AdmissionService::new(
            self.store.clone(),
            CredentialHasher::fast(),
            IdentityPolicy::default(),
            FixedOffset::east_opt(6 * 3600).unwrap(),
        );
        let request = BookingRequest {
            service_id: Some(self.service.id.to_string()),
            date: Some(date.to_string()),
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            name: Some("Rahim Uddin".to_string()),
            email: Some("rahim@example.com".to_string()),
            phone: Some("01712345678".to_string()),
            ..BookingRequest::default()
        };
        admission.admit(request).await.unwrap().appointment_id
    }

    async fn confirmed(&self, date: &str, start: &str, end: &str) -> Uuid {
        let id = self.book(date, start, end).await;
        self.payments().submit_manual_payment(id, details("TXN-1")).await.unwrap();
        self.payments()
            .verify(id, VerificationDecision::Approve, None)
            .await
            .unwrap();
        id
    }
}

fn details(transaction_id: &str) -> ManualPaymentDetails {
    ManualPaymentDetails {
        method: PaymentMethod::Nagad,
        sender_number: " 01812345678 ".to_string(),
        transaction_id: transaction_id.to_string(),
        notes: Some("  ".to_string()),
    }
}

// ==============================================================================
// MANUAL PAYMENT
// ==============================================================================

#[tokio::test]
async fn approved_payment_confirms_and_notifies() {
    let clinic = Clinic::new().await;
    let id = clinic.book("2026-03-01", "19:00", "19:30").await;

    let payment = clinic.payments().submit_manual_payment(id, details("TXN-1")).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::PendingVerification);
    assert_eq!(payment.sender_number.as_deref(), Some("01812345678"));
    assert_eq!(payment.notes, None);

    let verified = clinic
        .payments()
        .verify(id, VerificationDecision::Approve, None)
        .await
        .unwrap();
    assert_eq!(verified.appointment.status, AppointmentStatus::Confirmed);
    assert_eq!(verified.payment.status, PaymentStatus::Paid);
    assert!(verified.payment.verified_at.is_some());

    clinic.notifier.wait_for_emails(1).await;
    assert_eq!(clinic.notifier.subjects(), vec!["Appointment Confirmed".to_string()]);
    assert_eq!(clinic.notifier.sms.lock().unwrap().len(), 1);

    let actions: Vec<AuditAction> = clinic
        .store
        .audit_trail(id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::PaymentSubmitted, AuditAction::PaymentApproved]);
}

#[tokio::test]
async fn rejected_payment_returns_to_pending_and_accepts_resubmission() {
    let clinic = Clinic::new().await;
    let id = clinic.book("2026-03-01", "19:00", "19:30").await;

    clinic.payments().submit_manual_payment(id, details("TXN-1")).await.unwrap();
    let verified = clinic
        .payments()
        .verify(id, VerificationDecision::Reject, Some("Wrong transaction ID".to_string()))
        .await
        .unwrap();

    assert_eq!(verified.appointment.status, AppointmentStatus::PendingPayment);
    assert_eq!(verified.payment.status, PaymentStatus::Rejected);
    assert_eq!(verified.payment.notes.as_deref(), Some("Rejected: Wrong transaction ID"));

    clinic.notifier.wait_for_emails(1).await;
    assert_eq!(clinic.notifier.subjects(), vec!["Payment Rejected - Action Required".to_string()]);
    assert!(clinic.notifier.sms.lock().unwrap().is_empty());

    clinic.payments().submit_manual_payment(id, details("TXN-2")).await.unwrap();
    let attempts = clinic.store.payment_attempts(id).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].transaction_id, "TXN-2");

    let appointment = clinic.store.appointment(id).await.unwrap().unwrap();
    assert_eq!(appointment.status, AppointmentStatus::PendingVerification);
}

#[tokio::test]
async fn verification_requires_submitted_payment() {
    let clinic = Clinic::new().await;
    let id = clinic.book("2026-03-01", "19:00", "19:30").await;

    let result = clinic.payments().verify(id, VerificationDecision::Approve, None).await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::PendingPayment,
            to: AppointmentStatus::Confirmed,
        })
    );
}

#[tokio::test]
async fn payment_details_are_validated() {
    let clinic = Clinic::new().await;
    let id = clinic.book("2026-03-01", "19:00", "19:30").await;

    let bad = ManualPaymentDetails {
        method: PaymentMethod::Bkash,
        sender_number: "0171".to_string(),
        transaction_id: " ".to_string(),
        notes: None,
    };
    let fields = assert_matches!(
        clinic.payments().submit_manual_payment(id, bad).await,
        Err(AppointmentError::Validation(fields)) => fields
    );

    let names: Vec<&str> = fields.iter().map(|field| field.field.as_str()).collect();
    assert_eq!(names, vec!["senderNumber", "transactionId"]);
}

#[tokio::test]
async fn payment_for_unknown_appointment_is_not_found() {
    let clinic = Clinic::new().await;

    let result = clinic.payments().submit_manual_payment(Uuid::new_v4(), details("TXN-1")).await;

    assert_matches!(result, Err(AppointmentError::NotFound(what)) if what == "Appointment");
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn only_confirmed_appointments_complete() {
    let clinic = Clinic::new().await;
    let pending = clinic.book("2026-03-01", "19:00", "19:30").await;
    let confirmed = clinic.confirmed("2026-03-01", "19:30", "20:00").await;

    assert_matches!(
        clinic.lifecycle().complete(pending).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );

    let completed = clinic.lifecycle().complete(confirmed).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    assert_matches!(
        clinic.lifecycle().cancel(confirmed).await,
        Err(AppointmentError::InvalidStatusTransition { from: AppointmentStatus::Completed, .. })
    );
}

#[tokio::test]
async fn cancellation_is_audited_with_both_statuses() {
    let clinic = Clinic::new().await;
    let id = clinic.confirmed("2026-03-01", "19:00", "19:30").await;

    clinic.lifecycle().cancel(id).await.unwrap();

    let trail = clinic.store.audit_trail(id).await.unwrap();
    let last = trail.last().unwrap();
    assert_eq!(last.action, AuditAction::StatusChange);
    assert_eq!(last.details, json!({"from": "CONFIRMED", "to": "CANCELLED"}));
}

#[tokio::test]
async fn meeting_link_is_generated_when_not_given() {
    let clinic = Clinic::new().await;
    let id = clinic.confirmed("2026-03-01", "19:00", "19:30").await;

    let appointment = clinic.lifecycle().set_meeting_link(id, None).await.unwrap();

    assert_eq!(appointment.meeting_link, Some(format!("https://meet.jit.si/clinic-{}", id)));
    clinic.notifier.wait_for_emails(2).await;
    assert!(clinic.notifier.subjects().contains(&"Consultation Link Ready".to_string()));
}

#[tokio::test]
async fn meeting_link_must_be_http_url() {
    let clinic = Clinic::new().await;
    let id = clinic.confirmed("2026-03-01", "19:00", "19:30").await;

    let result = clinic
        .lifecycle()
        .set_meeting_link(id, Some("zoom meeting 123".to_string()))
        .await;

    assert_matches!(result, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn meeting_link_rejected_after_appointment_closes() {
    let clinic = Clinic::new().await;
    let id = clinic.confirmed("2026-03-01", "19:00", "19:30").await;
    clinic.lifecycle().complete(id).await.unwrap();

    let result = clinic
        .lifecycle()
        .set_meeting_link(id, Some("https://meet.example.com/room".to_string()))
        .await;

    assert_matches!(result, Err(AppointmentError::Closed(AppointmentStatus::Completed)));
}

// ==============================================================================
// DOCTOR CONSOLE
// ==============================================================================

#[tokio::test]
async fn summary_counts_today_and_confirmed_revenue() {
    let clinic = Clinic::new().await;
    clinic.confirmed("2026-03-01", "19:00", "19:30").await;
    let awaiting = clinic.book("2026-03-01", "19:30", "20:00").await;
    clinic.payments().submit_manual_payment(awaiting, details("TXN-9")).await.unwrap();
    let cancelled = clinic.book("2026-03-01", "20:00", "20:30").await;
    clinic.lifecycle().cancel(cancelled).await.unwrap();
    clinic.confirmed("2026-03-02", "19:00", "19:30").await;

    let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let summary = clinic.console().summary(today).await.unwrap();

    assert_eq!(summary.active_today, 2);
    assert_eq!(summary.awaiting_verification, 1);
    assert_eq!(summary.confirmed_revenue, clinic.service.fee * 2);
}

#[tokio::test]
async fn console_listing_filters_and_joins_details() {
    let clinic = Clinic::new().await;
    clinic.book("2026-03-01", "20:00", "20:30").await;
    let confirmed = clinic.confirmed("2026-03-01", "19:00", "19:30").await;

    let filter = AppointmentFilter { status: Some(AppointmentStatus::Confirmed), ..AppointmentFilter::default() };
    let listed = clinic.console().appointments(&filter).await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].appointment.id, confirmed);
    assert_eq!(listed[0].service.as_ref().map(|service| service.id), Some(clinic.service.id));
    assert_eq!(listed[0].patient.as_ref().map(|patient| patient.email.as_str()), Some("rahim@example.com"));
    assert_eq!(listed[0].payment.as_ref().map(|payment| payment.status), Some(PaymentStatus::Paid));

    let all = clinic.console().appointments(&AppointmentFilter::default()).await.unwrap();
    let starts: Vec<String> = all
        .iter()
        .map(|detail| detail.appointment.start_time.format("%H:%M").to_string())
        .collect();
    assert_eq!(starts, vec!["19:00", "20:00"]);
}
