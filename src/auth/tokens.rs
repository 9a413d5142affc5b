use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::keys::SigningKeys;
use crate::auth::{
    AuthConfig, AuthError, AuthResult, Clock, RevocationRegistry, Role, TokenRejection,
};

pub const TOKEN_TYPE: &str = "Bearer";
const ALGORITHM: Algorithm = Algorithm::RS256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub username: String,
    pub role: String,
}

impl TokenClaims {
    pub fn expires_at(&self) -> AuthResult<DateTime<Utc>> {
        from_timestamp(self.exp)
    }
}

/// A freshly minted access token and the metadata returned alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub token_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub kid: String,
    pub algorithm: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
    pub public_key_pem: String,
}

pub struct TokenService {
    keys: SigningKeys,
    validation: Validation,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
    revocations: Arc<dyn RevocationRegistry>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Builds the service without touching key material; keys load on first
    /// use. Call [`TokenService::warm_up`] to surface key errors at startup.
    pub fn from_config(
        config: &AuthConfig,
        revocations: Arc<dyn RevocationRegistry>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        config.validate()?;

        let mut validation = Validation::new(ALGORITHM);
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // expiry is checked against the injected clock instead
        validation.validate_exp = false;
        validation.leeway = 0;

        let access_token_ttl = Duration::try_seconds(config.access_token_ttl_secs).ok_or_else(|| {
            AuthError::Config(format!(
                "access token ttl of {} seconds is out of range",
                config.access_token_ttl_secs
            ))
        })?;

        Ok(Self {
            keys: SigningKeys::new(config.signing_key.clone(), config.jwt_kid.clone()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl,
            revocations,
            clock,
        })
    }

    pub fn warm_up(&self) -> AuthResult<()> {
        self.keys.get().map(|_| ())
    }

    pub fn issue(&self, user_id: &str, username: &str, role: Role) -> AuthResult<IssuedToken> {
        let keys = self.keys.get()?;
        let now = self.clock.now();
        let iat = now.timestamp();
        let exp = iat + self.access_token_ttl.num_seconds();
        let jti = Uuid::new_v4().to_string();

        let mut header = Header::new(ALGORITHM);
        header.kid = Some(keys.kid().to_string());

        let claims = TokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp,
            iat,
            jti: jti.clone(),
            username: username.to_string(),
            role: role.as_str().to_string(),
        };

        let token = encode(&header, &claims, &keys.encoding_key)?;

        Ok(IssuedToken {
            access_token: token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.access_token_ttl.num_seconds(),
            expires_at: from_timestamp(exp)?,
            token_id: jti,
        })
    }

    pub fn validate(&self, token: &str) -> bool {
        self.validate_and_extract(token).is_ok()
    }

    /// Signature, then expiry, then revocation. Claims are only handed out
    /// once all three pass.
    pub fn validate_and_extract(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.verify_signature(token)?;

        if self.clock.now().timestamp() >= claims.exp {
            log::debug!("rejected token {}: expired", claims.jti);
            return Err(AuthError::token_invalid(TokenRejection::Expired));
        }

        if self.revocations.is_revoked(&claims.jti) {
            log::debug!("rejected token {}: revoked", claims.jti);
            return Err(AuthError::token_invalid(TokenRejection::Revoked));
        }

        Ok(claims)
    }

    /// Same checks as [`TokenService::validate_and_extract`]. There is no way
    /// to read claims from a token that has not been verified.
    pub fn extract_claims(&self, token: &str) -> AuthResult<TokenClaims> {
        self.validate_and_extract(token)
    }

    /// Revokes a token we issued. Tokens that fail signature checks, or have
    /// already expired, are ignored. Returns whether this call revoked it.
    pub fn revoke(&self, token: &str) -> AuthResult<bool> {
        let claims = match self.verify_signature(token) {
            Ok(claims) => claims,
            Err(AuthError::TokenInvalid { reason }) => {
                log::debug!("ignoring revoke of unverifiable token: {}", reason);
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        if self.clock.now().timestamp() >= claims.exp {
            return Ok(false);
        }

        let newly = self.revocations.revoke(&claims.jti, claims.expires_at()?);
        if newly {
            log::info!("revoked token {} for user {}", claims.jti, claims.sub);
        }
        Ok(newly)
    }

    /// Swaps a valid token for a new one with the same subject, username and
    /// role. The old token id is claimed in the registry before the new token
    /// is signed, so a second refresh of the same token loses.
    pub fn refresh(&self, token: &str) -> AuthResult<IssuedToken> {
        let claims = self.validate_and_extract(token)?;
        let role = claims.role.parse::<Role>()?;

        if !self.revocations.revoke(&claims.jti, claims.expires_at()?) {
            log::warn!("refresh lost race for token {}", claims.jti);
            return Err(AuthError::token_invalid(TokenRejection::Revoked));
        }

        let issued = self.issue(&claims.sub, &claims.username, role)?;
        log::info!(
            "refreshed token {} -> {} for user {}",
            claims.jti,
            issued.token_id,
            claims.sub
        );
        Ok(issued)
    }

    pub fn metadata(&self) -> AuthResult<TokenMetadata> {
        let keys = self.keys.get()?;
        Ok(TokenMetadata {
            kid: keys.kid().to_string(),
            algorithm: format!("{ALGORITHM:?}"),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            access_token_ttl_secs: self.access_token_ttl.num_seconds(),
            public_key_pem: keys.public_key_pem().to_string(),
        })
    }

    pub fn purge_revocations(&self) -> usize {
        self.revocations.purge_expired(self.clock.now())
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationRegistry> {
        &self.revocations
    }

    fn verify_signature(&self, token: &str) -> AuthResult<TokenClaims> {
        let keys = self.keys.get()?;
        decode::<TokenClaims>(token, &keys.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                let reason = classify(err.kind());
                log::debug!("rejected token: {} ({})", reason, err);
                AuthError::token_invalid(reason)
            })
    }
}

fn classify(kind: &ErrorKind) -> TokenRejection {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience => TokenRejection::BadSignature,
        _ => TokenRejection::Malformed,
    }
}

fn from_timestamp(secs: i64) -> AuthResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(AuthError::token_invalid(TokenRejection::Malformed))
}
