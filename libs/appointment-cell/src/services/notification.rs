// libs/appointment-cell/src/services/notification.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{Appointment, Patient};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Email transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Outbound patient messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotificationError>;

    async fn send_sms(&self, to: &str, message: &str) -> Result<(), NotificationError>;
}

/// Email over the Resend HTTP API. There is no SMS gateway yet, so SMS is logged.
pub struct ResendNotifier {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl ResendNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.resend_base_url.trim_end_matches('/').to_string(),
            api_key: config.resend_api_key.clone(),
            from: config.notification_from.clone(),
        }
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotificationError> {
        let url = format!("{}/emails", self.base_url);
        debug!("Sending email '{}' via {}", subject, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected { status: status.as_u16(), body });
        }

        info!("Email '{}' accepted by provider", subject);
        Ok(())
    }

    async fn send_sms(&self, to: &str, message: &str) -> Result<(), NotificationError> {
        info!("[SMS to {}]: {}", to, message);
        Ok(())
    }
}

/// Writes every message to the log. Used when no email provider is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, to: &str, subject: &str, _html: &str) -> Result<(), NotificationError> {
        info!("[Email to {}]: {}", to, subject);
        Ok(())
    }

    async fn send_sms(&self, to: &str, message: &str) -> Result<(), NotificationError> {
        info!("[SMS to {}]: {}", to, message);
        Ok(())
    }
}

pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
    if config.is_email_configured() {
        Arc::new(ResendNotifier::new(config))
    } else {
        Arc::new(LogNotifier)
    }
}

/// A message ready to send to one patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientMessage {
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub html: String,
    pub sms: Option<String>,
}

impl PatientMessage {
    pub fn payment_approved(patient: &Patient, appointment: &Appointment) -> Self {
        let when = format!(
            "{} at {}",
            appointment.date.format("%B %-d, %Y"),
            appointment.start_time.format("%H:%M")
        );
        Self {
            email: patient.email.clone(),
            phone: Some(patient.phone.clone()),
            subject: "Appointment Confirmed".to_string(),
            html: format!(
                "<p>Hello {}, your payment has been verified. Your appointment on {} is now <strong>CONFIRMED</strong>.</p>",
                escape_html(&patient.name),
                when
            ),
            sms: Some(format!("Your appointment on {} is confirmed.", when)),
        }
    }

    pub fn payment_rejected(patient: &Patient, notes: Option<&str>) -> Self {
        let reason = notes.filter(|notes| !notes.trim().is_empty()).unwrap_or("Invalid transaction details");
        Self {
            email: patient.email.clone(),
            phone: None,
            subject: "Payment Rejected - Action Required".to_string(),
            html: format!(
                "<p>Hello {}, your payment verification failed. Reason: {}. Please resubmit your payment details.</p>",
                escape_html(&patient.name),
                escape_html(reason)
            ),
            sms: None,
        }
    }

    pub fn meeting_link(patient: &Patient, link: &str) -> Self {
        let link = escape_html(link);
        Self {
            email: patient.email.clone(),
            phone: None,
            subject: "Consultation Link Ready".to_string(),
            html: format!(
                "<p>Your consultation link is ready: <a href=\"{}\">{}</a></p>",
                link, link
            ),
            sms: None,
        }
    }
}

/// Sends in the background. The caller's state change is already committed and
/// never waits on, or fails because of, delivery.
pub fn dispatch(notifier: Arc<dyn Notifier>, message: PatientMessage) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.send_email(&message.email, &message.subject, &message.html).await {
            warn!("Failed to send '{}' email: {}", message.subject, e);
        }

        if let (Some(phone), Some(sms)) = (message.phone.as_deref(), message.sms.as_deref()) {
            if let Err(e) = notifier.send_sms(phone, sms).await {
                warn!("Failed to send SMS: {}", e);
            }
        }
    })
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use mockall::predicate::eq;
    use uuid::Uuid;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn patient() -> Patient {
        Patient {
            id: Uuid::new_v4(),
            name: "Rahim <Uddin>".to_string(),
            email: "rahim@example.com".to_string(),
            phone: "01711000000".to_string(),
            credential_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dispatch_swallows_delivery_failures() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send_email()
            .with(eq("rahim@example.com"), eq("Payment Rejected - Action Required"), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Err(NotificationError::Rejected { status: 500, body: "down".to_string() }));
        notifier.expect_send_sms().times(0);

        let message = PatientMessage::payment_rejected(&patient(), Some("Wrong TrxID"));
        dispatch(Arc::new(notifier), message).await.unwrap();
    }

    #[tokio::test]
    async fn confirmation_also_goes_out_by_sms() {
        let mut notifier = MockNotifier::new();
        notifier.expect_send_email().times(1).returning(|_, _, _| Ok(()));
        notifier
            .expect_send_sms()
            .with(eq("01711000000"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            problem: None,
            status: shared_models::AppointmentStatus::Confirmed,
            meeting_link: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let message = PatientMessage::payment_approved(&patient(), &appointment);
        assert!(message.html.contains("March 1, 2026 at 19:30"));
        assert!(message.html.contains("Rahim &lt;Uddin&gt;"));

        dispatch(Arc::new(notifier), message).await.unwrap();
    }

    #[tokio::test]
    async fn resend_posts_message_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(bearer_token("re_test"))
            .and(body_partial_json(json!({"to": ["rahim@example.com"], "subject": "Consultation Link Ready"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = AppConfig {
            resend_api_key: "re_test".to_string(),
            resend_base_url: server.uri(),
            ..AppConfig::default()
        };
        let message = PatientMessage::meeting_link(&patient(), "https://meet.jit.si/room");

        ResendNotifier::new(&config)
            .send_email(&message.email, &message.subject, &message.html)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resend_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid from"))
            .mount(&server)
            .await;

        let config = AppConfig {
            resend_api_key: "re_test".to_string(),
            resend_base_url: server.uri(),
            ..AppConfig::default()
        };

        let result = ResendNotifier::new(&config).send_email("a@b.co", "Hi", "<p>Hi</p>").await;
        assert!(matches!(result, Err(NotificationError::Rejected { status: 422, .. })));
    }
}
