//! Password hashing and verification using Argon2id.
//!
//! Both operations are CPU-bound; async callers go through [`hash_blocking`] and
//! [`verify_blocking`], which move the work onto tokio's blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{AppError, AppResult};

/// Hashes a password with a fresh random salt. Returns a PHC string safe for storage.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// Verifies `password` against a stored PHC hash. A mismatch is `Ok(false)`, not an error.
pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!("Password verification failed: {}", e))),
    }
}

pub async fn hash_blocking(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn verify_blocking(password: String, password_hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash)).await?
}
