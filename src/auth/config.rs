use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::{AuthError, AuthResult};

/// Where the RS256 signing keypair comes from.
#[derive(Clone)]
pub enum KeySource {
    /// PEM files on disk. The public key is derived from the private key when
    /// no path is given.
    Files {
        private_key: PathBuf,
        public_key: Option<PathBuf>,
    },
    /// PEM material held in memory.
    Pem {
        private_key: String,
        public_key: Option<String>,
    },
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Files {
                private_key,
                public_key,
            } => f
                .debug_struct("Files")
                .field("private_key", private_key)
                .field("public_key", public_key)
                .finish(),
            KeySource::Pem { public_key, .. } => f
                .debug_struct("Pem")
                .field("private_key", &"<redacted>")
                .field("public_key", &public_key.is_some())
                .finish(),
        }
    }
}

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
    pub signing_key: KeySource,
    pub jwt_kid: Option<String>,
    pub password_min_length: usize,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub revocation_purge_interval: Duration,
}

impl AuthConfig {
    pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
    pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 366 * 24 * 60 * 60;
    pub const DEFAULT_ARGON2_MEMORY_KIB: u32 = 19 * 1024;
    pub const DEFAULT_ARGON2_ITERATIONS: u32 = 2;

    pub fn from_env() -> AuthResult<Self> {
        let issuer = env_string("IDENTITY_JWT_ISSUER", "http://localhost");
        let audience = env_string("IDENTITY_JWT_AUDIENCE", "identity-api");
        let access_token_ttl_secs = env_parse(
            "IDENTITY_ACCESS_TOKEN_TTL_SECS",
            Self::DEFAULT_ACCESS_TOKEN_TTL_SECS,
        )?;
        let private_key = env::var("IDENTITY_JWT_PRIVATE_KEY_PATH")
            .map(PathBuf::from)
            .map_err(|_| AuthError::Config("IDENTITY_JWT_PRIVATE_KEY_PATH is required".into()))?;
        let public_key = env::var("IDENTITY_JWT_PUBLIC_KEY_PATH")
            .ok()
            .map(PathBuf::from);
        let jwt_kid = env::var("IDENTITY_JWT_KID").ok();
        let password_min_length = env_parse("IDENTITY_PASSWORD_MIN_LENGTH", 8)?;
        let argon2_memory_kib =
            env_parse("IDENTITY_ARGON2_MEMORY_KIB", Self::DEFAULT_ARGON2_MEMORY_KIB)?;
        let argon2_iterations =
            env_parse("IDENTITY_ARGON2_ITERATIONS", Self::DEFAULT_ARGON2_ITERATIONS)?;
        let purge_secs: u64 = env_parse("IDENTITY_REVOCATION_PURGE_SECS", 300)?;

        let config = Self {
            issuer,
            audience,
            access_token_ttl_secs,
            signing_key: KeySource::Files {
                private_key,
                public_key,
            },
            jwt_kid,
            password_min_length,
            argon2_memory_kib,
            argon2_iterations,
            revocation_purge_interval: Duration::from_secs(purge_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Config with default policy around an in-memory keypair.
    pub fn with_pem(private_key: impl Into<String>, public_key: Option<String>) -> Self {
        Self {
            issuer: "http://localhost".into(),
            audience: "identity-api".into(),
            access_token_ttl_secs: Self::DEFAULT_ACCESS_TOKEN_TTL_SECS,
            signing_key: KeySource::Pem {
                private_key: private_key.into(),
                public_key,
            },
            jwt_kid: None,
            password_min_length: 8,
            argon2_memory_kib: Self::DEFAULT_ARGON2_MEMORY_KIB,
            argon2_iterations: Self::DEFAULT_ARGON2_ITERATIONS,
            revocation_purge_interval: Duration::from_secs(300),
        }
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.access_token_ttl_secs <= 0
            || self.access_token_ttl_secs > Self::MAX_ACCESS_TOKEN_TTL_SECS
        {
            return Err(AuthError::Config(format!(
                "access token ttl must be between 1 and {} seconds, got {}",
                Self::MAX_ACCESS_TOKEN_TTL_SECS,
                self.access_token_ttl_secs
            )));
        }
        if self.issuer.trim().is_empty() || self.audience.trim().is_empty() {
            return Err(AuthError::Config("issuer and audience must be set".into()));
        }
        if self.revocation_purge_interval.is_zero() {
            return Err(AuthError::Config(
                "revocation purge interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset falls back to the default; set but unparsable is a startup error.
fn env_parse<T: FromStr>(key: &str, default: T) -> AuthResult<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| AuthError::Config(format!("{key} has an invalid value '{value}'"))),
        Err(_) => Ok(default),
    }
}
