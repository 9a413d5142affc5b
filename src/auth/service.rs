//! Registration, login and logout on top of the user directory, the password
//! hasher and the token service.

use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use crate::auth::directory::{UserDirectory, UserRecord};
use crate::auth::events::{EventPublisher, IdentityEvent, UserLoggedIn, UserRegistered};
use crate::auth::passwords::PasswordHasher;
use crate::auth::responses::{LoginResponse, RegisterRequest, UserSummary};
use crate::auth::tokens::IssuedToken;
use crate::auth::{AuthError, AuthResult, Clock, TokenService};

const DUMMY_PASSWORD: &str = "timing-equalizer";

pub struct AuthenticationService {
    tokens: Arc<TokenService>,
    hasher: Arc<dyn PasswordHasher>,
    directory: Arc<dyn UserDirectory>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    password_min_length: usize,
    dummy_hash: OnceLock<String>,
}

impl AuthenticationService {
    pub fn new(
        tokens: Arc<TokenService>,
        hasher: Arc<dyn PasswordHasher>,
        directory: Arc<dyn UserDirectory>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        password_min_length: usize,
    ) -> Self {
        Self {
            tokens,
            hasher,
            directory,
            events,
            clock,
            password_min_length,
            dummy_hash: OnceLock::new(),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AuthResult<UserSummary> {
        let username = normalize(&request.username);
        let email = normalize(&request.email);

        if request.role.is_bootstrap() {
            log::warn!(
                "rejected self-registration of '{}' with role {}",
                username,
                request.role
            );
            return Err(AuthError::PrivilegeEscalationRejected);
        }

        self.validate_registration(&username, &email, &request.password)?;

        if self.directory.find_by_username(&username).await?.is_some()
            || self.directory.find_by_email(&email).await?.is_some()
        {
            log::debug!("registration conflict for '{}'", username);
            return Err(AuthError::RegistrationConflict);
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            role: request.role,
            display_name: request
                .display_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            created_at: self.clock.now(),
            last_login_at: None,
        };
        let user = self.directory.save(user).await?;
        log::info!(
            "registered user {} ({}) as {}",
            user.id,
            user.username,
            user.role
        );

        self.publish(IdentityEvent::UserRegistered(UserRegistered {
            user_id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            occurred_at: user.created_at,
        }))
        .await;

        Ok(UserSummary::from(&user))
    }

    /// Unknown usernames and wrong passwords produce the same error, after
    /// the same amount of hashing work.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginResponse> {
        let username = normalize(username);

        let Some(mut user) = self.directory.find_by_username(&username).await? else {
            if let Some(dummy) = self.dummy_hash() {
                let _ = self.hasher.verify(dummy, password);
            }
            log::warn!("failed login for '{}'", username);
            return Err(AuthError::InvalidCredentials);
        };

        let verified = match self.hasher.verify(&user.password_hash, password) {
            Ok(verified) => verified,
            Err(err) => {
                log::error!("stored hash for user {} is unusable: {}", user.id, err);
                false
            }
        };
        if !verified {
            log::warn!("failed login for '{}'", username);
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        self.directory.record_login(&user.id, now).await?;
        user.last_login_at = Some(now);

        let token = self.tokens.issue(&user.id, &user.username, user.role)?;
        log::info!("user {} logged in (token {})", user.id, token.token_id);

        self.publish(IdentityEvent::UserLoggedIn(UserLoggedIn {
            user_id: user.id.clone(),
            username: user.username.clone(),
            occurred_at: now,
        }))
        .await;

        Ok(LoginResponse {
            token,
            user: UserSummary::from(&user),
        })
    }

    /// Idempotent: unknown or already revoked tokens are not an error.
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        if self.tokens.revoke(token)? {
            log::info!("logout revoked a live token");
        }
        Ok(())
    }

    pub async fn refresh(&self, token: &str) -> AuthResult<IssuedToken> {
        self.tokens.refresh(token)
    }

    fn validate_registration(&self, username: &str, email: &str, password: &str) -> AuthResult<()> {
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Err(AuthError::Validation(
                "username must be non-empty and contain no whitespace".into(),
            ));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("email must contain '@'".into()));
        }
        if password.chars().count() < self.password_min_length {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                self.password_min_length
            )));
        }
        Ok(())
    }

    fn dummy_hash(&self) -> Option<&str> {
        if let Some(hash) = self.dummy_hash.get() {
            return Some(hash);
        }
        let hash = self.hasher.hash(DUMMY_PASSWORD).ok()?;
        Some(self.dummy_hash.get_or_init(|| hash))
    }

    async fn publish(&self, event: IdentityEvent) {
        if let Err(err) = self.events.publish(&event).await {
            log::warn!("failed to publish {}: {}", event.event_type(), err);
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
