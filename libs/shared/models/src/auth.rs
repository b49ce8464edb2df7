use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DOCTOR_ROLE: &str = "doctor";
pub const PATIENT_ROLE: &str = "patient";

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_doctor(&self) -> bool {
        self.role.as_deref() == Some(DOCTOR_ROLE)
    }

    pub fn is_patient(&self) -> bool {
        self.role.as_deref() == Some(PATIENT_ROLE)
    }
}
