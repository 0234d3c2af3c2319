use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tollgate_auth::{UserRecord, UserStore};
use tollgate_core::{StoreError, UserId};

/// How long a looked-up user is served from memory.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// TTL cache in front of any [`UserStore`].
///
/// Only successful `query_by_id` results are cached. Credential checks always
/// reach the inner store; a successful one refreshes the cached record.
#[derive(Debug)]
pub struct CachedUserStore<S> {
    inner: S,
    ttl: Duration,
    entries: RwLock<HashMap<UserId, (UserRecord, Instant)>>,
}

impl<S> CachedUserStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop a cached record, e.g. after the user was disabled.
    pub fn invalidate(&self, id: UserId) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&id);
    }

    fn cached(&self, id: UserId) -> Option<UserRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&id)
            .filter(|(_, stored)| stored.elapsed() < self.ttl)
            .map(|(user, _)| user.clone())
    }

    fn remember(&self, user: &UserRecord) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, (_, stored)| stored.elapsed() < self.ttl);
        entries.insert(user.id, (user.clone(), Instant::now()));
    }
}

#[async_trait::async_trait]
impl<S> UserStore for CachedUserStore<S>
where
    S: UserStore,
{
    async fn query_by_id(&self, id: UserId) -> Result<UserRecord, StoreError> {
        if let Some(user) = self.cached(id) {
            return Ok(user);
        }

        let user = self.inner.query_by_id(id).await?;
        self.remember(&user);
        Ok(user)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord, StoreError> {
        let user = self.inner.authenticate(email, password).await?;
        self.remember(&user);
        Ok(user)
    }
}
