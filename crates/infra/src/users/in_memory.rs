use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Deserialize;
use thiserror::Error;

use tollgate_auth::{ResourceStore, Role, UserRecord, UserStore};
use tollgate_core::{StoreError, UserId};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing user seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("user {email}: {reason}")]
    Invalid { email: String, reason: String },

    #[error("hashing password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// One entry of a user seed file. Exactly one of `password` (hashed on load)
/// or `password_hash` (bcrypt) is given.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSeed {
    #[serde(default)]
    pub id: Option<UserId>,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// In-memory user store with bcrypt password hashes.
///
/// Intended for tests/dev and small deployments seeded from a file.
#[derive(Debug)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
    cost: u32,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    /// Store hashing new passwords at `cost`. Low costs are for tests.
    pub fn with_cost(cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            cost,
        }
    }

    /// Load a JSON array of [`UserSeed`] entries.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::new();
        let n = store.seed_json(&raw)?;
        tracing::info!(path = %path.display(), users = n, "loaded user seed");
        Ok(store)
    }

    /// Add every entry of a JSON seed document. Returns the number of users
    /// held afterwards.
    pub fn seed_json(&self, document: &str) -> Result<usize, SeedError> {
        let seeds: Vec<UserSeed> = serde_json::from_str(document)?;
        for seed in seeds {
            self.seed(seed)?;
        }
        Ok(self.len())
    }

    pub fn seed(&self, seed: UserSeed) -> Result<UserRecord, SeedError> {
        let password_hash = match (seed.password, seed.password_hash) {
            (Some(password), None) => bcrypt::hash(password, self.cost)?,
            (None, Some(hash)) => hash,
            _ => {
                return Err(SeedError::Invalid {
                    email: seed.email,
                    reason: "exactly one of password or password_hash is required".into(),
                });
            }
        };

        let record = UserRecord {
            id: seed.id.unwrap_or_else(UserId::new),
            email: seed.email,
            roles: seed.roles,
            password_hash,
            enabled: seed.enabled,
        };
        self.insert(record.clone());
        Ok(record)
    }

    /// Create a user from a plaintext password.
    pub fn add_user(
        &self,
        email: impl Into<String>,
        password: &str,
        roles: Vec<Role>,
    ) -> Result<UserRecord, SeedError> {
        self.seed(UserSeed {
            id: None,
            email: email.into(),
            roles,
            password: Some(password.to_string()),
            password_hash: None,
            enabled: true,
        })
    }

    pub fn insert(&self, user: UserRecord) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(user.id, user);
    }

    pub fn set_enabled(&self, id: UserId, enabled: bool) -> bool {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        match users.get_mut(&id) {
            Some(user) => {
                user.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Every user, ordered by email.
    pub fn list(&self) -> Vec<UserRecord> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<UserRecord> = users.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        all
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn query_by_id(&self, id: UserId) -> Result<UserRecord, StoreError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord, StoreError> {
        let user = self
            .find_by_email(email)
            .ok_or(StoreError::InvalidCredentials)?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| StoreError::backend(e.to_string()))?;

        match verified {
            Ok(true) => Ok(user),
            _ => Err(StoreError::InvalidCredentials),
        }
    }
}

#[async_trait::async_trait]
impl ResourceStore for InMemoryUserStore {
    const KIND: &'static str = "user";

    type Id = UserId;
    type Resource = UserRecord;

    async fn query_by_id(&self, id: UserId) -> Result<UserRecord, StoreError> {
        UserStore::query_by_id(self, id).await
    }
}
