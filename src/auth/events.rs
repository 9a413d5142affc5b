use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{AuthError, AuthResult, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRegistered {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLoggedIn {
    pub user_id: String,
    pub username: String,
    pub occurred_at: DateTime<Utc>,
}

/// Identity changes other services may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    UserRegistered(UserRegistered),
    UserLoggedIn(UserLoggedIn),
}

impl IdentityEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            IdentityEvent::UserRegistered(_) => "identity.user_registered",
            IdentityEvent::UserLoggedIn(_) => "identity.user_logged_in",
        }
    }

    pub fn payload(&self) -> AuthResult<serde_json::Value> {
        let value = match self {
            IdentityEvent::UserRegistered(event) => serde_json::to_value(event),
            IdentityEvent::UserLoggedIn(event) => serde_json::to_value(event),
        };
        value.map_err(|err| AuthError::Publish(format!("failed to encode payload: {err}")))
    }
}

/// Fire-and-forget notification sink. Delivery and retries belong to the
/// implementation; callers only log failures.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &IdentityEvent) -> AuthResult<()>;
}

/// Publisher that writes events to the log. Used when no broker is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &IdentityEvent) -> AuthResult<()> {
        let payload = event.payload()?;
        log::info!("event {}: {}", event.event_type(), payload);
        Ok(())
    }
}
