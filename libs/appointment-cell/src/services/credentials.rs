// libs/appointment-cell/src/services/credentials.rs
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, instrument};

use crate::models::AppointmentError;

const TEMPORARY_CREDENTIAL_LENGTH: usize = 12;

/// Hashes patient credentials. Work runs on the blocking pool so request threads stay free.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self { params: Params::default() }
    }
}

impl CredentialHasher {
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    /// Cheapest parameters argon2 accepts, for tests.
    pub fn fast() -> Self {
        match Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None) {
            Ok(params) => Self::with_params(params),
            Err(_) => Self::default(),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    #[instrument(skip_all)]
    pub async fn hash(&self, secret: String) -> Result<String, AppointmentError> {
        let argon2 = self.argon2();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(secret.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AppointmentError::Credential(e.to_string()))
        })
        .await
        .map_err(|e| AppointmentError::Credential(format!("Hashing task failed: {}", e)))?
    }

    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool, AppointmentError> {
        let parsed = PasswordHash::new(hash).map_err(|e| AppointmentError::Credential(e.to_string()))?;

        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppointmentError::Credential(e.to_string())),
        }
    }

    /// `verify` on the blocking pool, for request paths.
    #[instrument(skip_all)]
    pub async fn matches(&self, secret: String, hash: String) -> Result<bool, AppointmentError> {
        let hasher = self.clone();

        tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .map_err(|e| AppointmentError::Credential(format!("Verification task failed: {}", e)))?
    }

    /// Random credential for patients who book without choosing a password.
    pub fn temporary_credential() -> String {
        debug!("Generating temporary patient credential");
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMPORARY_CREDENTIAL_LENGTH)
            .map(char::from)
            .collect()
    }
}
