/// Password hashing and verification using Argon2id
///
/// Hashes are PHC strings carrying algorithm, parameters and salt:
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 threads
/// - Salt: 16 bytes random
/// - Output: 32 bytes hash
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    /// Wrong password or unusable stored hash; callers cannot tell which
    #[error("Password does not match")]
    Mismatch,
}

/// Password hashing configuration
///
/// Increasing memory or iterations improves security but slows down hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a plaintext password with the default parameters
///
/// # Example
///
/// ```no_run
/// use quill_api::auth::password::hash_password;
///
/// let hash = hash_password("correct horse").expect("Failed to hash password");
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

/// Hash a password with custom Argon2 parameters
///
/// A fresh random salt is drawn for every call, so hashing the same
/// password twice yields two different strings.
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Parameters are read back from the PHC string, so hashes made with any
/// `PasswordConfig` verify here. Every failure, including a corrupted
/// hash, is reported as [`PasswordError::Mismatch`].
///
/// # Example
///
/// ```no_run
/// use quill_api::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("correct horse").unwrap();
/// assert!(verify_password(&hash, "correct horse").is_ok());
/// assert!(verify_password(&hash, "battery staple").is_err());
/// ```
pub fn verify_password(hash: &str, password: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::debug!(error = %e, "stored password hash is not a valid PHC string");
        PasswordError::Mismatch
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|e| {
            if !matches!(e, argon2::password_hash::Error::Password) {
                tracing::debug!(error = %e, "password verification failed");
            }
            PasswordError::Mismatch
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn light_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "SecureP@ssw0rd!";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, password).is_ok());
        assert!(matches!(
            verify_password(&hash, "WrongPassword"),
            Err(PasswordError::Mismatch)
        ));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        let password = "SamePassword123!";

        let hash1 = hash_password_with_config(password, &light_config()).unwrap();
        let hash2 = hash_password_with_config(password, &light_config()).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password(&hash1, password).is_ok());
        assert!(verify_password(&hash2, password).is_ok());
    }

    #[test]
    fn test_corrupted_hash_is_a_plain_mismatch() {
        let result = verify_password("invalid-hash-format", "password");
        assert!(matches!(result, Err(PasswordError::Mismatch)));

        let hash = hash_password_with_config("password", &light_config()).unwrap();
        let truncated = &hash[..hash.len() - 4];
        assert!(matches!(
            verify_password(truncated, "password"),
            Err(PasswordError::Mismatch)
        ));
    }

    #[test]
    fn test_custom_config() {
        let config = PasswordConfig {
            memory_cost: 32768,
            time_cost: 2,
            parallelism: 2,
            output_len: Some(32),
        };

        let password = "TestPassword123!";
        let hash = hash_password_with_config(password, &config).unwrap();

        assert!(verify_password(&hash, password).is_ok());
        assert!(hash.contains("m=32768"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=2"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PasswordConfig {
            memory_cost: 1,
            ..light_config()
        };
        assert!(matches!(
            hash_password_with_config("pw", &config),
            Err(PasswordError::HashingFailed(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_verify_accepts_only_the_hashed_password(
            password in "[ -~]{1,32}",
            other in "[ -~]{1,32}",
        ) {
            let hash = hash_password_with_config(&password, &light_config()).unwrap();
            prop_assert!(verify_password(&hash, &password).is_ok());
            if other != password {
                prop_assert!(verify_password(&hash, &other).is_err());
            }
        }
    }
}
