use std::fmt;

use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why a bearer token was rejected.
///
/// Callers only ever see [`AuthError::TokenInvalid`]; the reason is kept for
/// diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    BadSignature,
    Expired,
    Revoked,
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::BadSignature => "bad signature",
            TokenRejection::Expired => "expired",
            TokenRejection::Revoked => "revoked",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username or email already registered")]
    RegistrationConflict,
    #[error("requested role cannot be self-assigned")]
    PrivilegeEscalationRejected,
    #[error("token invalid")]
    TokenInvalid { reason: TokenRejection },
    #[error("forbidden")]
    AuthorizationDenied,
    #[error("unrecognized role '{0}'")]
    UnrecognizedRole(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("user directory error: {0}")]
    Directory(String),
    #[error("event publish error: {0}")]
    Publish(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("rsa key error: {0}")]
    Rsa(String),
}

impl AuthError {
    pub fn token_invalid(reason: TokenRejection) -> Self {
        AuthError::TokenInvalid { reason }
    }

    /// Diagnostic reason for token rejections, `None` for every other error.
    pub fn rejection(&self) -> Option<TokenRejection> {
        match self {
            AuthError::TokenInvalid { reason } => Some(*reason),
            _ => None,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidCredentials
            | AuthError::TokenInvalid { .. }
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::PrivilegeEscalationRejected
            | AuthError::AuthorizationDenied
            | AuthError::UnrecognizedRole(_) => Status::Forbidden,
            AuthError::RegistrationConflict => Status::Conflict,
            AuthError::Validation(_) => Status::BadRequest,
            AuthError::Config(_)
            | AuthError::Directory(_)
            | AuthError::Publish(_)
            | AuthError::Io(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Rsa(_) => Status::InternalServerError,
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

impl From<rsa::pkcs8::Error> for AuthError {
    fn from(err: rsa::pkcs8::Error) -> Self {
        AuthError::Rsa(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for AuthError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        AuthError::Rsa(err.to_string())
    }
}

impl From<rsa::pkcs8::spki::Error> for AuthError {
    fn from(err: rsa::pkcs8::spki::Error) -> Self {
        AuthError::Rsa(err.to_string())
    }
}
