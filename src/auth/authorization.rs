//! Role-hierarchy and resource-ownership checks.
//!
//! Every self-scoped record (a student's own profile, a teacher's own survey)
//! goes through [`AuthorizationEngine::is_owner_or_privileged`], either
//! directly or via [`AuthorizationEngine::authorize_resource`].

use std::sync::Arc;

use crate::auth::{AuthError, AuthResult, Principal, Role, TokenService};

/// A record that belongs to exactly one user.
pub trait OwnedResource {
    fn owner_id(&self) -> &str;
}

pub struct AuthorizationEngine {
    tokens: Arc<TokenService>,
}

impl AuthorizationEngine {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    pub fn has_minimum_level(actual: Role, required: Role) -> bool {
        actual.at_least(required)
    }

    /// Verifies the token and maps its role claim onto the known role set.
    pub fn authenticate(&self, token: &str) -> AuthResult<Principal> {
        let claims = self.tokens.validate_and_extract(token)?;
        Principal::from_claims(&claims).inspect_err(|_| {
            log::warn!(
                "token {} for user {} carries unknown role '{}'",
                claims.jti,
                claims.sub,
                claims.role
            );
        })
    }

    pub fn check_role(&self, token: &str, required: Role) -> AuthResult<Principal> {
        let principal = self.authenticate(token)?;
        Self::require(&principal, required)?;
        Ok(principal)
    }

    pub fn require(principal: &Principal, required: Role) -> AuthResult<()> {
        if Self::has_minimum_level(principal.role, required) {
            Ok(())
        } else {
            log::debug!(
                "denied {} ({}): requires {}",
                principal.username,
                principal.role,
                required
            );
            Err(AuthError::AuthorizationDenied)
        }
    }

    /// True when the principal holds at least `bypass` or owns the resource.
    pub fn is_owner_or_privileged(principal: &Principal, owner_id: &str, bypass: Role) -> bool {
        Self::has_minimum_level(principal.role, bypass) || principal.user_id == owner_id
    }

    pub fn ensure_owner_or_privileged(
        principal: &Principal,
        owner_id: &str,
        bypass: Role,
    ) -> AuthResult<()> {
        if Self::is_owner_or_privileged(principal, owner_id, bypass) {
            Ok(())
        } else {
            log::debug!(
                "denied {} access to resource owned by {}",
                principal.user_id,
                owner_id
            );
            Err(AuthError::AuthorizationDenied)
        }
    }

    pub fn authorize_resource<R: OwnedResource + ?Sized>(
        principal: &Principal,
        resource: &R,
        bypass: Role,
    ) -> AuthResult<()> {
        Self::ensure_owner_or_privileged(principal, resource.owner_id(), bypass)
    }
}
