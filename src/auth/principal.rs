use serde::{Deserialize, Serialize};

use crate::auth::tokens::TokenClaims;
use crate::auth::{AuthResult, Role};

/// The caller behind a verified bearer token.
///
/// Only built from claims that already passed signature, expiry and
/// revocation checks. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl Principal {
    /// Maps the role claim onto the current role set. The claim comes from
    /// outside the trust boundary so an unknown name is a runtime error.
    pub fn from_claims(claims: &TokenClaims) -> AuthResult<Self> {
        let role = claims.role.parse::<Role>()?;
        Ok(Self {
            user_id: claims.sub.clone(),
            username: claims.username.clone(),
            role,
        })
    }
}
