//! Fixtures shared by unit and integration tests: a checked-in RSA keypair,
//! a pinned clock and fully wired auth state over in-memory collaborators.
//! Never point production configuration at these keys.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::auth::clock::ManualClock;
use crate::auth::responses::RegisterRequest;
use crate::auth::{
    AuthConfig, AuthError, AuthResult, AuthState, EventPublisher, IdentityEvent,
    InMemoryRevocationRegistry, InMemoryUserDirectory, KeySource, PasswordService, Role,
};

pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/test_rsa_private.pem");
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/test_rsa_public.pem");
pub const FOREIGN_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/foreign_rsa_private.pem");

pub const TEST_TTL_SECS: i64 = 900;

/// Config over the fixture keypair with cheap Argon2 parameters.
pub fn test_config() -> AuthConfig {
    let mut config = AuthConfig::with_pem(TEST_PRIVATE_KEY_PEM, Some(TEST_PUBLIC_KEY_PEM.into()));
    config.issuer = "https://identity.test".into();
    config.audience = "identity-test".into();
    config.access_token_ttl_secs = TEST_TTL_SECS;
    config.jwt_kid = Some("test-kid".into());
    config.argon2_memory_kib = 1024;
    config.argon2_iterations = 1;
    config
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(epoch()))
}

/// Publisher that keeps every event, or fails every publish when asked to.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<IdentityEvent>>,
    fail: bool,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<IdentityEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &IdentityEvent) -> AuthResult<()> {
        if self.fail {
            return Err(AuthError::Publish("broker unavailable".into()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Auth state plus handles on its collaborators.
pub struct TestIdentity {
    pub state: AuthState,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub events: Arc<RecordingEventPublisher>,
}

impl TestIdentity {
    pub fn new() -> Self {
        Self::with_publisher(RecordingEventPublisher::new())
    }

    pub fn with_publisher(publisher: RecordingEventPublisher) -> Self {
        let config = test_config();
        let clock = fixed_clock();
        let directory = Arc::new(InMemoryUserDirectory::new());
        let events = Arc::new(publisher);
        let hasher = Arc::new(PasswordService::from_config(&config).expect("password service"));

        let state = AuthState::new(
            config,
            hasher,
            directory.clone(),
            events.clone(),
            Arc::new(InMemoryRevocationRegistry::new()),
            clock.clone(),
        )
        .expect("auth state");

        Self {
            state,
            clock,
            directory,
            events,
        }
    }

    /// Registers a user through the real service and returns its id.
    pub async fn register(&self, username: &str, password: &str, role: Role) -> String {
        self.state
            .authentication
            .register(RegisterRequest {
                username: username.into(),
                email: format!("{username}@school.test"),
                password: password.into(),
                role,
                display_name: None,
            })
            .await
            .expect("register user")
            .id
    }
}

impl Default for TestIdentity {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture config whose keys come from the given PEM files.
pub fn file_config(private_key: &std::path::Path, public_key: Option<&std::path::Path>) -> AuthConfig {
    let mut config = test_config();
    config.signing_key = KeySource::Files {
        private_key: private_key.to_path_buf(),
        public_key: public_key.map(|path| path.to_path_buf()),
    };
    config
}
