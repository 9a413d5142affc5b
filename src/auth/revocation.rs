use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;

use crate::auth::Clock;

/// Token ids invalidated before their natural expiry.
///
/// Implementations must tolerate concurrent `revoke` and `is_revoked` calls
/// without outside locking.
pub trait RevocationRegistry: Send + Sync {
    /// Records `token_id` as revoked until `expires_at`. Returns `true` only
    /// for the call that inserted it, so racing callers can tell who won.
    fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> bool;

    fn is_revoked(&self, token_id: &str) -> bool;

    /// Drops entries whose token has expired on its own by `now`.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local registry. Not shared between replicas.
#[derive(Debug, Default)]
pub struct InMemoryRevocationRegistry {
    entries: DashMap<String, DateTime<Utc>>,
}

impl InMemoryRevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevocationRegistry for InMemoryRevocationRegistry {
    fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> bool {
        match self.entries.entry(token_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                true
            }
        }
    }

    fn is_revoked(&self, token_id: &str) -> bool {
        self.entries.contains_key(token_id)
    }

    // An entry is only dropped once `now >= exp`, at which point the expiry
    // check already rejects the token.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Periodically prunes `registry`. The task runs until the handle is aborted
/// or the runtime shuts down.
pub fn spawn_purge_task(
    registry: Arc<dyn RevocationRegistry>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = registry.purge_expired(clock.now());
            if removed > 0 {
                log::debug!(
                    "purged {} expired revocations ({} remain)",
                    removed,
                    registry.len()
                );
            }
        }
    })
}
