//! Wire types of the authority endpoints.
//!
//! These are shared by the handlers and by `HttpAuthorityClient`, so both
//! sides of the network hop agree on the field names.

use serde::{Deserialize, Serialize};

use tollgate_auth::{Claims, Rule};
use tollgate_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Body of a successful `GET /v1/auth/authenticate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    pub claims: Claims,
}

/// Body of `POST /v1/auth/authorize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    pub claims: Claims,
    pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveness {
    pub status: String,
}
