use std::env;
use std::net::SocketAddr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

/// Offset used when `CLINIC_UTC_OFFSET_MINUTES` is missing: Asia/Dhaka (UTC+06:00, no DST).
pub const DEFAULT_CLINIC_OFFSET_MINUTES: i32 = 6 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub seed_demo_data: bool,
    pub clinic_utc_offset_minutes: i32,
    pub resend_api_key: String,
    pub resend_base_url: String,
    pub notification_from: String,
    pub allow_email_account_claim: bool,
    pub meeting_base_url: String,
    pub meeting_room_prefix: String,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("supabase") => StorageBackend::Supabase,
                Ok("memory") => StorageBackend::Memory,
                Ok(other) => {
                    warn!("Unknown STORAGE_BACKEND '{}', using in-memory store", other);
                    StorageBackend::Memory
                }
                Err(_) => StorageBackend::Memory,
            },
            seed_demo_data: flag("SEED_DEMO_DATA", true),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(|| {
                    warn!("CLINIC_UTC_OFFSET_MINUTES not set or invalid, using +06:00");
                    DEFAULT_CLINIC_OFFSET_MINUTES
                }),
            resend_api_key: env::var("RESEND_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("RESEND_API_KEY not set, emails will only be logged");
                    String::new()
                }),
            resend_base_url: env::var("RESEND_BASE_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            notification_from: env::var("NOTIFICATION_FROM")
                .unwrap_or_else(|_| "Clinic <noreply@clinic.local>".to_string()),
            allow_email_account_claim: flag("ALLOW_EMAIL_ACCOUNT_CLAIM", false),
            meeting_base_url: env::var("MEETING_BASE_URL")
                .unwrap_or_else(|_| "https://meet.jit.si".to_string()),
            meeting_room_prefix: env::var("MEETING_ROOM_PREFIX")
                .unwrap_or_else(|_| "Clinic-Consultation".to_string()),
            bind_addr: env::var("API_BIND_ADDR")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000))),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.resend_api_key.is_empty()
    }

    /// Fixed offset of the clinic's wall clock. Out-of-range values fall back to the default.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60)
            .or_else(|| FixedOffset::east_opt(DEFAULT_CLINIC_OFFSET_MINUTES * 60))
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            seed_demo_data: false,
            clinic_utc_offset_minutes: DEFAULT_CLINIC_OFFSET_MINUTES,
            resend_api_key: String::new(),
            resend_base_url: "https://api.resend.com".to_string(),
            notification_from: "Clinic <noreply@clinic.local>".to_string(),
            allow_email_account_claim: false,
            meeting_base_url: "https://meet.jit.si".to_string(),
            meeting_room_prefix: "Clinic-Consultation".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

fn flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
