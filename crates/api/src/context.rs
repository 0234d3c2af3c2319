use tollgate_auth::Claims;
use tollgate_core::UserId;

/// Verified identity of the caller, placed in request extensions by the
/// authentication stage and read by every later stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub claims: Claims,
}

impl AuthContext {
    pub fn new(user_id: UserId, claims: Claims) -> Self {
        Self { user_id, claims }
    }
}

/// An entity fetched by resource-scoped authorization, handed to the handler
/// so it is not fetched twice.
#[derive(Debug, Clone, PartialEq)]
pub struct Owned<T>(pub T);
