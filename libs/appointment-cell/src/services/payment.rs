// libs/appointment-cell/src/services/payment.rs
use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use shared_models::error::FieldError;

use crate::models::{AppointmentError, ManualPaymentDetails, Payment, VerificationDecision};
use crate::services::notification::{dispatch, Notifier, PatientMessage};
use crate::store::{BookingStore, VerifiedPayment};

const MIN_SENDER_NUMBER_LENGTH: usize = 11;

/// Manual mobile-banking payments: the patient reports a transfer, the doctor checks it.
pub struct PaymentService {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn BookingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    #[instrument(skip(self, details))]
    pub async fn submit_manual_payment(
        &self,
        appointment_id: Uuid,
        details: ManualPaymentDetails,
    ) -> Result<Payment, AppointmentError> {
        let details = validate_details(details)?;
        let payment = self.store.submit_payment(appointment_id, details).await?;

        info!(
            "Payment details submitted for appointment {} via {}",
            appointment_id,
            payment.method.as_str()
        );
        Ok(payment)
    }

    /// Applies the doctor's decision, then tells the patient without waiting for delivery.
    #[instrument(skip(self, notes))]
    pub async fn verify(
        &self,
        appointment_id: Uuid,
        decision: VerificationDecision,
        notes: Option<String>,
    ) -> Result<VerifiedPayment, AppointmentError> {
        let verified = self
            .store
            .verify_payment(appointment_id, decision, notes.clone())
            .await?;

        let message = match decision {
            VerificationDecision::Approve => {
                info!("Payment approved, appointment {} confirmed", appointment_id);
                PatientMessage::payment_approved(&verified.patient, &verified.appointment)
            }
            VerificationDecision::Reject => {
                info!("Payment rejected, appointment {} back to pending payment", appointment_id);
                PatientMessage::payment_rejected(&verified.patient, notes.as_deref())
            }
        };
        dispatch(self.notifier.clone(), message);

        Ok(verified)
    }
}

fn validate_details(details: ManualPaymentDetails) -> Result<ManualPaymentDetails, AppointmentError> {
    let sender_number = details.sender_number.trim().to_string();
    let transaction_id = details.transaction_id.trim().to_string();

    let mut errors = Vec::new();
    if sender_number.chars().count() < MIN_SENDER_NUMBER_LENGTH {
        errors.push(FieldError::new("senderNumber", "Sender number is too short"));
    }
    if transaction_id.is_empty() {
        errors.push(FieldError::new("transactionId", "Transaction ID is required"));
    }
    if !errors.is_empty() {
        return Err(AppointmentError::Validation(errors));
    }

    Ok(ManualPaymentDetails {
        method: details.method,
        sender_number,
        transaction_id,
        notes: details.notes.map(|notes| notes.trim().to_string()).filter(|notes| !notes.is_empty()),
    })
}
