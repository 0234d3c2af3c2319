//! Domain entities whose owner decides who may touch them.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use tollgate_core::{StoreError, UserId};

/// An entity with a single owning user.
pub trait OwnedResource {
    fn owner_id(&self) -> UserId;
}

/// Lookup of owned entities by id, used for resource-scoped authorization.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Human-readable entity name used in logs ("product", "home", ...).
    const KIND: &'static str;

    type Id: FromStr + Display + Copy + Send + Sync + 'static;
    type Resource: OwnedResource + Clone + Send + Sync + 'static;

    async fn query_by_id(&self, id: Self::Id) -> Result<Self::Resource, StoreError>;
}

#[async_trait::async_trait]
impl<S> ResourceStore for Arc<S>
where
    S: ResourceStore,
{
    const KIND: &'static str = S::KIND;

    type Id = S::Id;
    type Resource = S::Resource;

    async fn query_by_id(&self, id: Self::Id) -> Result<Self::Resource, StoreError> {
        (**self).query_by_id(id).await
    }
}
