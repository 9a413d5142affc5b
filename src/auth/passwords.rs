use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher as _, PasswordVerifier as _,
    Version, password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::{AuthConfig, AuthError, AuthResult};

const SALT_LEN: usize = 16;

/// Salted one-way hashing of credentials.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> AuthResult<String>;

    /// `Ok(false)` for a wrong password; `Err` only when `hash` is unusable.
    fn verify(&self, hash: &str, plain: &str) -> AuthResult<bool>;
}

/// Argon2id hasher producing PHC strings.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new(memory_kib: u32, iterations: u32) -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(memory_kib);
        builder.t_cost(iterations);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::new(config.argon2_memory_kib, config.argon2_iterations)
    }
}

impl PasswordHasher for PasswordService {
    fn hash(&self, plain: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, hash: &str, plain: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash)?;
        match self.argon2.verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }
}
