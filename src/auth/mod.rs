//! Identity and access control: configuration, credential handling, token
//! issuance and revocation, role and ownership checks, and Rocket request
//! guards.

use std::sync::Arc;

use tokio::task::JoinHandle;

pub mod authorization;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod guards;
pub mod keys;
pub mod passwords;
pub mod principal;
pub mod responses;
pub mod revocation;
pub mod roles;
pub mod service;
pub mod tokens;

pub use authorization::{AuthorizationEngine, OwnedResource};
pub use clock::{Clock, SystemClock};
pub use config::{AuthConfig, KeySource};
pub use directory::{InMemoryUserDirectory, UserDirectory, UserRecord};
pub use error::{AuthError, AuthResult, TokenRejection};
pub use events::{EventPublisher, IdentityEvent, LogEventPublisher};
pub use guards::{AuthUser, RequireAdmin, RequireRole, RequireSuperAdmin, RequireTeacher};
pub use passwords::{PasswordHasher, PasswordService};
pub use principal::Principal;
pub use revocation::{InMemoryRevocationRegistry, RevocationRegistry};
pub use roles::Role;
pub use service::AuthenticationService;
pub use tokens::{IssuedToken, TokenClaims, TokenService};

/// Everything a request handler needs, shared through Rocket managed state.
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub tokens: Arc<TokenService>,
    pub authorization: Arc<AuthorizationEngine>,
    pub authentication: Arc<AuthenticationService>,
    clock: Arc<dyn Clock>,
}

impl AuthState {
    /// Wires the services together and loads the signing keys, so bad key
    /// material fails here rather than on the first request.
    pub fn new(
        config: AuthConfig,
        hasher: Arc<dyn PasswordHasher>,
        directory: Arc<dyn UserDirectory>,
        events: Arc<dyn EventPublisher>,
        revocations: Arc<dyn RevocationRegistry>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let tokens = Arc::new(TokenService::from_config(
            &config,
            revocations,
            Arc::clone(&clock),
        )?);
        tokens.warm_up()?;

        let authorization = Arc::new(AuthorizationEngine::new(Arc::clone(&tokens)));
        let authentication = Arc::new(AuthenticationService::new(
            Arc::clone(&tokens),
            hasher,
            directory,
            events,
            Arc::clone(&clock),
            config.password_min_length,
        ));

        Ok(Self {
            config,
            tokens,
            authorization,
            authentication,
            clock,
        })
    }

    /// Production wiring: Argon2id hashing, a process-local revocation
    /// registry and the system clock.
    pub fn from_config(
        config: AuthConfig,
        directory: Arc<dyn UserDirectory>,
        events: Arc<dyn EventPublisher>,
    ) -> AuthResult<Self> {
        let hasher = Arc::new(PasswordService::from_config(&config)?);
        Self::new(
            config,
            hasher,
            directory,
            events,
            Arc::new(InMemoryRevocationRegistry::new()),
            Arc::new(SystemClock),
        )
    }

    /// Starts pruning revocations whose tokens have expired. Needs a running
    /// tokio runtime.
    pub fn spawn_revocation_purge(&self) -> JoinHandle<()> {
        revocation::spawn_purge_task(
            Arc::clone(self.tokens.revocations()),
            Arc::clone(&self.clock),
            self.config.revocation_purge_interval,
        )
    }
}
