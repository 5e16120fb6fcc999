//! Argon2 password hashing shared by the identity backends

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{PortalError, Result};

pub(crate) fn check_strength(password: &str, min_len: usize) -> Result<()> {
    if password.chars().count() < min_len {
        return Err(PortalError::PasswordTooWeak(format!(
            "Password must be at least {min_len} characters"
        )));
    }
    Ok(())
}

pub(crate) fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PortalError::Internal(e.to_string()))
}

pub(crate) fn verify(password: &str, stored_hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| PortalError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PortalError::InvalidCredentials)
}
