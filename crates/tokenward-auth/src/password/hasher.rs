//! Argon2id credential hashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Argon2, password_hash};

use tokenward_core::error::{AppError, AuthFailure};
use tokenward_core::result::AppResult;

/// Hashes and checks passwords with Argon2id and a random per-hash salt.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Creates a hasher with the Argon2id defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces a PHC-format hash of `password`.
    pub fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
    }

    /// Whether `password` matches a stored hash.
    ///
    /// A malformed stored hash is an internal error, not a mismatch.
    pub fn matches(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::internal(format!("Stored password hash is malformed: {e}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::internal(format!(
                "Password verification failed: {e}"
            ))),
        }
    }

    /// Checks a credential, failing with `InvalidCredentials` on mismatch
    /// or when the account has no password.
    pub fn verify(&self, password: &str, hash: Option<&str>) -> AppResult<()> {
        match hash {
            Some(hash) if self.matches(password, hash)? => Ok(()),
            _ => Err(AppError::unauthorized(AuthFailure::InvalidCredentials)),
        }
    }
}
