//! Password hashing
//!
//! Argon2id with a per-hash random salt. Verification goes through the
//! PHC string, so parameter changes only affect new hashes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::shared::error::{AccountError, Result};

/// Argon2id cost parameters.
#[derive(Debug, Clone)]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Number of iterations
    pub time_cost: u32,
    /// Degree of parallelism
    pub parallelism: u32,
    /// Output length in bytes
    pub output_len: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: 32,
        }
    }
}

impl Argon2Config {
    /// Weak parameters for fast test runs. Never use in production.
    pub fn testing() -> Self {
        Self {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            output_len: 32,
        }
    }

    fn to_params(&self) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| AccountError::internal(format!("invalid Argon2 parameters: {e}")))
    }
}

pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new(config: Argon2Config) -> Result<Self> {
        let params = config.to_params()?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AccountError::internal(format!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    /// Constant-time comparison against a stored PHC hash. A mismatch
    /// is `Ok(false)`; only malformed hashes are errors.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AccountError::internal(format!("malformed password hash: {e}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AccountError::internal(format!(
                "password verification failed: {e}"
            ))),
        }
    }
}

impl Default for PasswordService {
    fn default() -> Self {
        // Default parameters are always valid.
        Self::new(Argon2Config::default()).unwrap_or_else(|_| Self {
            argon2: Argon2::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        PasswordService::new(Argon2Config::testing()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let service = service();
        let hash = service.hash_password("correct horse").unwrap();
        assert!(service.verify_password("correct horse", &hash).unwrap());
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let service = service();
        let hash = service.hash_password("correct horse").unwrap();
        assert!(!service.verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_salts_are_unique() {
        let service = service();
        let a = service.hash_password("same input").unwrap();
        let b = service.hash_password("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_uses_argon2id() {
        let service = service();
        let hash = service.hash_password("pw").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let service = service();
        assert!(service.verify_password("pw", "not-a-phc-string").is_err());
    }
}
