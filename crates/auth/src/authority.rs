//! Token issuance, authentication and authorization.
//!
//! `TokenAuthority` is the only component that touches key material or policy.
//! Everything above it (HTTP handlers, middleware, the remote client) sees
//! `Claims` and `AuthError`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, Header};
use thiserror::Error;

use tollgate_core::{AppError, ErrCode, UserId};

use crate::basic::BasicCredentials;
use crate::claims::ClaimsError;
use crate::keys::{KeyError, KeyResolver};
use crate::policy::{
    AuthenticationInput, AuthorizationInput, Decision, NativePolicy, PolicyError, PolicyEvaluator,
    PolicyInput,
};
use crate::token::{TokenParseError, parse_unverified};
use crate::user::UserStore;
use crate::{Claims, Role, Rule};

/// Default bound on user-store lookups.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifetime of claims synthesized from Basic credentials.
pub const BASIC_TOKEN_TTL_HOURS: i64 = 8760;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("expected authorization header format: Bearer <token>")]
    MissingBearer,

    #[error("error parsing token: {0}")]
    TokenParse(String),

    #[error("kid missing from header")]
    KidMissing,

    #[error("kid malformed")]
    KidMalformed,

    #[error("failed to fetch public key: {0}")]
    PublicKey(#[source] KeyError),

    #[error("failed to fetch private key: {0}")]
    PrivateKey(#[source] KeyError),

    #[error("signing token: {0}")]
    Signing(String),

    #[error("invalid claims: {0}")]
    InvalidClaims(#[from] ClaimsError),

    #[error("authentication failed: {0}")]
    AuthenticationDenied(String),

    #[error("user disabled")]
    UserDisabled,

    #[error("query user: {0}")]
    UserLookup(String),

    #[error("subject is not a user id: {0}")]
    InvalidSubject(String),

    #[error("authentication failed")]
    InvalidCredentials,

    #[error("no user store configured")]
    NoUserStore,

    #[error("authorize: you are not authorized for that action, claims[{roles}] rule[{rule}]: {reason}")]
    AuthorizationDenied {
        roles: String,
        rule: Rule,
        reason: String,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl AuthError {
    pub fn code(&self) -> ErrCode {
        match self {
            AuthError::PrivateKey(_) | AuthError::Signing(_) | AuthError::Policy(_) => {
                ErrCode::Internal
            }
            AuthError::InvalidClaims(_) => ErrCode::InvalidArgument,
            _ => ErrCode::Unauthenticated,
        }
    }
}

impl From<TokenParseError> for AuthError {
    fn from(value: TokenParseError) -> Self {
        match value {
            TokenParseError::KidMissing => AuthError::KidMissing,
            TokenParseError::KidMalformed => AuthError::KidMalformed,
            TokenParseError::Malformed(reason) => AuthError::TokenParse(reason),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        AppError::new(value.code(), value.to_string())
    }
}

/// Issues and verifies signed tokens and evaluates access rules.
///
/// Authentication and authorization run against separate evaluators. Without
/// a user store the authority only verifies tokens locally and cannot
/// exchange Basic credentials.
#[derive(Clone)]
pub struct TokenAuthority {
    keys: Arc<dyn KeyResolver>,
    authentication: Arc<dyn PolicyEvaluator>,
    authorization: Arc<dyn PolicyEvaluator>,
    users: Option<Arc<dyn UserStore>>,
    issuer: String,
    lookup_timeout: Duration,
}

impl core::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("issuer", &self.issuer)
            .field("has_user_store", &self.users.is_some())
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    /// Authority backed by the native rule table for both questions.
    pub fn new(keys: Arc<dyn KeyResolver>, issuer: impl Into<String>) -> Self {
        let native: Arc<dyn PolicyEvaluator> = Arc::new(NativePolicy::default());
        Self {
            keys,
            authentication: native.clone(),
            authorization: native,
            users: None,
            issuer: issuer.into(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_authentication_policy(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.authentication = policy;
        self
    }

    pub fn with_authorization_policy(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.authorization = policy;
        self
    }

    pub fn with_user_store(mut self, users: Arc<dyn UserStore>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn has_user_store(&self) -> bool {
        self.users.is_some()
    }

    /// Sign `claims` with the private key named by `kid`. The kid is stamped
    /// into the token header.
    pub fn issue_token(&self, kid: &str, claims: &Claims) -> Result<String, AuthError> {
        claims.validate_window()?;

        let private = self.keys.private_key(kid).map_err(AuthError::PrivateKey)?;
        let key = private
            .encoding_key()
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());

        let token = jsonwebtoken::encode(&header, claims, &key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        tracing::debug!(kid = %kid, sub = %claims.sub, "issued token");
        Ok(token)
    }

    /// Verify an `Authorization: Bearer <token>` header value and return the
    /// claims it carries.
    pub async fn authenticate(&self, bearer: &str) -> Result<Claims, AuthError> {
        let result = self.authenticate_bearer(bearer).await;
        if let Err(e) = &result {
            tracing::info!(reason = %e, "authentication failed");
        }
        result
    }

    async fn authenticate_bearer(&self, bearer: &str) -> Result<Claims, AuthError> {
        let token = bearer
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingBearer)?;

        let unverified = parse_unverified(token)?;

        let public = self
            .keys
            .public_key(&unverified.kid)
            .map_err(AuthError::PublicKey)?;

        let input = PolicyInput::Authentication(AuthenticationInput {
            key: &public,
            token,
            issuer: &self.issuer,
        });
        if let Decision::Deny(reason) = self.authentication.evaluate(&Rule::AUTHENTICATE, &input)? {
            return Err(AuthError::AuthenticationDenied(reason));
        }

        let claims = unverified.claims;
        let user_id = claims
            .subject_id()
            .map_err(|_| AuthError::InvalidSubject(claims.sub.clone()))?;

        if let Some(users) = &self.users {
            let user = tokio::time::timeout(self.lookup_timeout, users.query_by_id(user_id))
                .await
                .map_err(|_| AuthError::UserLookup("timed out".to_string()))?
                .map_err(|e| AuthError::UserLookup(e.to_string()))?;
            if !user.enabled {
                return Err(AuthError::UserDisabled);
            }
        }

        Ok(claims)
    }

    /// Check `rule` for the caller described by `claims` against the target
    /// subject `user_id`.
    pub fn authorize(
        &self,
        claims: &Claims,
        user_id: UserId,
        rule: &Rule,
    ) -> Result<(), AuthError> {
        let input = PolicyInput::Authorization(AuthorizationInput {
            roles: &claims.roles,
            subject: &claims.sub,
            user_id,
        });

        match self.authorization.evaluate(rule, &input)? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                tracing::debug!(
                    rule = %rule,
                    sub = %claims.sub,
                    user_id = %user_id,
                    %reason,
                    "authorization denied"
                );
                Err(AuthError::AuthorizationDenied {
                    roles: join_roles(&claims.roles),
                    rule: rule.clone(),
                    reason,
                })
            }
        }
    }

    /// Verify Basic credentials against the user store and synthesize claims
    /// for the matched user.
    pub async fn exchange_basic(
        &self,
        credentials: &BasicCredentials,
    ) -> Result<Claims, AuthError> {
        let users = self.users.as_ref().ok_or(AuthError::NoUserStore)?;

        let lookup = users.authenticate(&credentials.email, &credentials.password);
        let user = match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Err(_) => return Err(AuthError::UserLookup("timed out".to_string())),
            Ok(Err(tollgate_core::StoreError::Backend(e))) => {
                return Err(AuthError::UserLookup(e));
            }
            Ok(Err(_)) => return Err(AuthError::InvalidCredentials),
            Ok(Ok(user)) => user,
        };

        if !user.enabled {
            tracing::info!(user_id = %user.id, "basic exchange for disabled user");
            return Err(AuthError::UserDisabled);
        }

        Ok(Claims::new(
            user.id.to_string(),
            self.issuer.clone(),
            user.roles,
            Utc::now(),
            chrono::Duration::hours(BASIC_TOKEN_TTL_HOURS),
        ))
    }
}

fn join_roles(roles: &[Role]) -> String {
    roles.iter().map(Role::as_str).collect::<Vec<_>>().join(" ")
}
