//! Argon2id password hashing and verification.
//!
//! Parameters follow OWASP ASVS (memory: 19 MiB, iterations: 2,
//! parallelism: 1). An optional pepper is prepended to the password
//! before hashing and must match at verification time.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use zeroize::Zeroizing;

use crate::error::AuthError;

fn argon2() -> Result<Argon2<'static>, AuthError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Pepper + password in a buffer that is wiped on drop.
fn peppered(password: &str, pepper: Option<&str>) -> Zeroizing<Vec<u8>> {
    let mut input = Vec::with_capacity(pepper.map_or(0, str::len) + password.len());
    if let Some(p) = pepper {
        input.extend_from_slice(p.as_bytes());
    }
    input.extend_from_slice(password.as_bytes());
    Zeroizing::new(input)
}

/// Hash `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let input = peppered(password, pepper);
    argon2()?
        .hash_password(&input, &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch and `Err(AuthError::Crypto)` only when
/// the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    let input = peppered(password, pepper);
    match argon2()?.verify_password(&input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}
