use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, DOCTOR_ROLE, PATIENT_ROLE};

/// Configuration for router and store tests; points Supabase at a mock server when needed.
pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "clinic-test-secret-long-enough-for-hs256-signing".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self { supabase_url: url.to_string(), ..Self::default() }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// A caller as the auth provider would describe them in a token.
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("patient@clinic.test")
    }
}

impl TestUser {
    pub fn doctor(email: &str) -> Self {
        Self::with_role(email, DOCTOR_ROLE)
    }

    pub fn patient(email: &str) -> Self {
        Self::with_role(email, PATIENT_ROLE)
    }

    fn with_role(email: &str, role: &str) -> Self {
        Self { id: Uuid::new_v4().to_string(), email: email.to_string(), role: role.to_string() }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

/// HS256 tokens in the shape Supabase issues them.
pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign(
            &json!({ "alg": "HS256", "typ": "JWT" }),
            &json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role,
                "aud": "authenticated",
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "not-the-clinic-secret", None)
    }

    pub fn create_malformed_token() -> String {
        "not.a.token".to_string()
    }

    /// `Authorization` header value for the doctor, signed with the default test secret.
    pub fn doctor_bearer() -> String {
        let doctor = TestUser::doctor("doctor@clinic.test");
        format!("Bearer {}", Self::create_test_token(&doctor, &TestConfig::default().jwt_secret, None))
    }

    fn sign(header: &Value, claims: &Value, secret: &str) -> String {
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );

        let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return signing_input,
        };
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }
}
