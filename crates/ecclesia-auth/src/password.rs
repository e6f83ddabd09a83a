//! Password hashing
//!
//! New hashes are argon2id. Accounts imported with bcrypt hashes (`$2a$`,
//! `$2b$`, `$2y$`) still verify through [`PasswordService`].

use crate::error::AuthError;
use crate::AuthResult;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::thread_rng;
use std::sync::Arc;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub trait PasswordHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> AuthResult<String>;

    /// `Ok(false)` on mismatch; errors only for malformed hashes
    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool>;

    fn hasher_name(&self) -> &str;
}

/// Argon2id hasher
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Hasher {
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Cheap parameters for tests and local development
    pub fn development() -> Self {
        Self {
            memory_cost: 4096,
            time_cost: 2,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> AuthResult<Argon2<'static>> {
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| AuthError::crypto_error(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut thread_rng());
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::crypto_error(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| AuthError::crypto_error(e.to_string()))?;
        // Parameters are read from the encoded hash
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    fn hasher_name(&self) -> &str {
        "argon2"
    }
}

/// bcrypt hasher, kept for verifying imported accounts
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    fn hasher_name(&self) -> &str {
        "bcrypt"
    }
}

/// Hashes with argon2 and verifies either format
#[derive(Clone)]
pub struct PasswordService {
    primary: Arc<dyn PasswordHasher>,
    legacy: Arc<dyn PasswordHasher>,
}

impl PasswordService {
    pub fn new(primary: Arc<dyn PasswordHasher>) -> Self {
        Self {
            primary,
            legacy: Arc::new(BcryptHasher::default()),
        }
    }

    pub fn development() -> Self {
        Self::new(Arc::new(Argon2Hasher::development()))
    }

    pub fn hash(&self, password: &str) -> AuthResult<String> {
        validate_password_strength(password)?;
        self.primary.hash_password(password)
    }

    pub fn verify(&self, password: &str, hash: &str) -> AuthResult<bool> {
        if is_bcrypt_hash(hash) {
            self.legacy.verify_password(password, hash)
        } else {
            self.primary.verify_password(password, hash)
        }
    }
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new(Arc::new(Argon2Hasher::default()))
    }
}

impl std::fmt::Debug for PasswordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordService")
            .field("primary", &self.primary.hasher_name())
            .finish()
    }
}

fn is_bcrypt_hash(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"].iter().any(|p| hash.starts_with(p))
}

pub fn validate_password_strength(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            message: format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ),
        });
    }
    Ok(())
}
