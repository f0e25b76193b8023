//! Salted password hashing (argon2id, PHC string format).
//!
//! Both functions are slow on purpose. Async callers run them on a blocking
//! thread.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::{LedgerError, LedgerResult};

/// Hashes `password` with a fresh random salt.
pub fn hash_password(password: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LedgerError::Credential(e.to_string()))
}

/// Checks `password` against a stored PHC hash.
///
/// A hash that cannot be parsed is an error, not a mismatch.
pub fn verify_password(password: &str, phc: &str) -> LedgerResult<bool> {
    let parsed = PasswordHash::new(phc).map_err(|e| LedgerError::Credential(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(LedgerError::Credential(e.to_string())),
    }
}
