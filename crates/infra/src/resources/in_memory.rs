use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::RwLock;

use tollgate_auth::{OwnedResource, ResourceStore};
use tollgate_core::StoreError;

/// An entity addressable by its own id.
pub trait Keyed {
    const KIND: &'static str;
    type Id: FromStr + Display + core::fmt::Debug + Copy + Eq + Hash + Send + Sync + 'static;

    fn key(&self) -> Self::Id;
}

/// In-memory owned-resource store.
///
/// Intended for tests/dev. A store can be switched into a failing mode to
/// exercise backend-error handling.
#[derive(Debug)]
pub struct InMemoryResourceStore<R: Keyed> {
    inner: RwLock<HashMap<R::Id, R>>,
    failure: RwLock<Option<String>>,
}

impl<R: Keyed> Default for InMemoryResourceStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Keyed> InMemoryResourceStore<R> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
        }
    }

    pub fn upsert(&self, resource: R) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(resource.key(), resource);
    }

    pub fn remove(&self, id: R::Id) -> Option<R> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&id)
    }

    /// Make every lookup fail with a backend error until cleared with `None`.
    pub fn set_failure(&self, reason: Option<String>) {
        *self.failure.write().unwrap_or_else(|e| e.into_inner()) = reason;
    }
}

impl<R: Keyed + Clone> InMemoryResourceStore<R> {
    fn get(&self, id: R::Id) -> Result<R, StoreError> {
        if let Some(reason) = self.failure.read().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(StoreError::Backend(reason));
        }
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    /// Every stored resource, in no particular order.
    pub fn list(&self) -> Vec<R> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl<R> ResourceStore for InMemoryResourceStore<R>
where
    R: Keyed + OwnedResource + Clone + Send + Sync + 'static,
{
    const KIND: &'static str = R::KIND;

    type Id = R::Id;
    type Resource = R;

    async fn query_by_id(&self, id: R::Id) -> Result<R, StoreError> {
        self.get(id)
    }
}
