/// Password hashing with Argon2id
///
/// Hashes are stored in PHC string format, so the parameters used at signup
/// travel with the hash and verification keeps working if they change later.
///
/// # Example
///
/// ```
/// use tasktrack_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("password")?;
/// assert!(verify_password("password", &hash)?);
/// assert!(!verify_password("hunter2", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Memory cost in KiB (19 MiB)
const MEMORY_COST_KIB: u32 = 19 * 1024;

/// Passes over memory
const TIME_COST: u32 = 2;

/// Lanes
const PARALLELISM: u32 = 1;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Hashing failed
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Verification failed for a reason other than a wrong password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a plaintext password with a fresh random salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Checks a plaintext password against a stored hash
///
/// Returns `Ok(false)` for a wrong password; errors are reserved for
/// malformed hashes.
///
/// # Errors
///
/// Returns `PasswordError::InvalidHash` if `hash` cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    // Parameters come from the parsed hash, not from `hasher()`
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_argon2id_with_configured_cost() {
        let hash = hash_password("password").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("password").expect("Hash should succeed");
        let second = hash_password("password").expect("Hash should succeed");

        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_accepts_correct_password() {
        let hash = hash_password("correct horse").expect("Hash should succeed");

        assert!(verify_password("correct horse", &hash).expect("Verify should succeed"));
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let hash = hash_password("correct horse").expect("Hash should succeed");

        assert!(!verify_password("battery staple", &hash).expect("Verify should succeed"));
        assert!(!verify_password("", &hash).expect("Verify should succeed"));
    }

    #[test]
    fn test_verify_reports_malformed_hash() {
        let result = verify_password("password", "not-a-phc-string");

        assert!(matches!(result, Err(PasswordError::InvalidHash(_))));
    }
}
