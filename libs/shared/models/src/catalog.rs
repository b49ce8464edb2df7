use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable consultation type. Duration drives the slot grid, fee seeds the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicService {
    pub id: Uuid,
    pub name: String,
    pub fee: i64,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    PendingPayment,
    PendingVerification,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that grey out a slot in the patient-facing grid.
    pub const SLOT_DISPLAY_HOLDING: [AppointmentStatus; 2] = [
        AppointmentStatus::Confirmed,
        AppointmentStatus::PendingPayment,
    ];

    /// Statuses that block admission of a new booking for the same date and start time.
    pub const ADMISSION_HOLDING: [AppointmentStatus; 3] = [
        AppointmentStatus::Confirmed,
        AppointmentStatus::PendingPayment,
        AppointmentStatus::PendingVerification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingPayment => "PENDING_PAYMENT",
            AppointmentStatus::PendingVerification => "PENDING_VERIFICATION",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::PendingPayment => &[
                AppointmentStatus::PendingVerification,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::PendingVerification => &[
                AppointmentStatus::Confirmed,
                AppointmentStatus::PendingPayment, // payment rejected
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    pub fn holds_slot_for_admission(&self) -> bool {
        Self::ADMISSION_HOLDING.contains(self)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING_PAYMENT" => Ok(AppointmentStatus::PendingPayment),
            "PENDING_VERIFICATION" => Ok(AppointmentStatus::PendingVerification),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_returns_to_pending_payment() {
        assert!(AppointmentStatus::PendingVerification.can_transition_to(AppointmentStatus::PendingPayment));
        assert!(AppointmentStatus::PendingVerification.can_transition_to(AppointmentStatus::Confirmed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::Confirmed.can_transition_to(AppointmentStatus::PendingPayment));
        assert!(!AppointmentStatus::PendingPayment.can_transition_to(AppointmentStatus::Confirmed));
    }

    #[test]
    fn admission_holding_includes_pending_verification() {
        assert!(AppointmentStatus::PendingVerification.holds_slot_for_admission());
        assert!(!AppointmentStatus::SLOT_DISPLAY_HOLDING.contains(&AppointmentStatus::PendingVerification));
        assert!(!AppointmentStatus::Cancelled.holds_slot_for_admission());
    }

    #[test]
    fn wire_format_is_screaming_snake_case() {
        let json = serde_json::to_string(&AppointmentStatus::PendingVerification).unwrap();
        assert_eq!(json, "\"PENDING_VERIFICATION\"");
        assert_eq!("confirmed".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Confirmed);
    }
}
