//! The slice of a user the authority needs, and the store it comes from.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tollgate_core::{StoreError, UserId};

use crate::Role;
use crate::resource::OwnedResource;

/// A user as seen by authentication: identity, roles and whether the account
/// may still sign in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// bcrypt hash of the password.
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub enabled: bool,
}

impl core::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl OwnedResource for UserRecord {
    /// A user owns itself.
    fn owner_id(&self) -> UserId {
        self.id
    }
}

/// User lookups consumed by the authority.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn query_by_id(&self, id: UserId) -> Result<UserRecord, StoreError>;

    /// Verify an email/password pair. Fails with
    /// [`StoreError::InvalidCredentials`] when either is wrong.
    async fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord, StoreError>;
}

#[async_trait::async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn query_by_id(&self, id: UserId) -> Result<UserRecord, StoreError> {
        (**self).query_by_id(id).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord, StoreError> {
        (**self).authenticate(email, password).await
    }
}
