use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::auth::{AuthError, AuthResult, Role};

/// A stored account. `password_hash` is a PHC string, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Lookup and persistence of accounts. Usernames and emails are expected to
/// arrive already normalized (trimmed, lowercase).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>>;

    /// Inserts or updates `user`. Fails with `RegistrationConflict` if another
    /// account already holds the username or email.
    async fn save(&self, user: UserRecord) -> AuthResult<UserRecord>;

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> AuthResult<()>;
}

/// Directory kept in process memory, keyed by username. Emails map to the
/// id of the account that claimed them.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserRecord>,
    emails: DashMap<String, String>,
    ids: DashMap<String, String>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Reserves `email` for `user_id`. Returns `true` only when this call
    /// inserted the entry, so a failed save knows whether to release it.
    fn claim_email(&self, email: &str, user_id: &str) -> AuthResult<bool> {
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(owner) if owner.get() != user_id => Err(AuthError::RegistrationConflict),
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(user_id.to_string());
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        let Some(user_id) = self.emails.get(email).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        let Some(username) = self.ids.get(&user_id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        self.find_by_username(&username).await
    }

    async fn save(&self, user: UserRecord) -> AuthResult<UserRecord> {
        let claimed = self.claim_email(&user.email, &user.id)?;

        match self.users.entry(user.username.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().id != user.id {
                    if claimed {
                        self.emails.remove_if(&user.email, |_, owner| owner == &user.id);
                    }
                    return Err(AuthError::RegistrationConflict);
                }
                if existing.get().email != user.email {
                    self.emails.remove(&existing.get().email);
                }
                existing.insert(user.clone());
            }
            Entry::Vacant(slot) => {
                self.ids.insert(user.id.clone(), user.username.clone());
                slot.insert(user.clone());
            }
        }

        Ok(user)
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> AuthResult<()> {
        let username = self
            .ids
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AuthError::Directory(format!("unknown user id {user_id}")))?;
        if let Some(mut user) = self.users.get_mut(&username) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }
}
