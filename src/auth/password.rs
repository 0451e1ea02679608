use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::{LedgerError, LedgerResult};

/// Salted Argon2 digest of a raw password. Slow by construction; the salt
/// comes from the OS RNG.
pub fn hash_password(plain: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            LedgerError::Storage(anyhow::anyhow!(e.to_string()))
        })?
        .to_string();
    Ok(hash)
}

/// Constant-time verification against a stored digest.
pub fn verify_password(plain: &str, hash: &str) -> LedgerResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        LedgerError::Storage(anyhow::anyhow!(e.to_string()))
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
