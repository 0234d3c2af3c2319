//! Request gatekeeping.
//!
//! Each stage is an axum `from_fn_with_state` middleware and short-circuits
//! the chain on failure:
//!
//! - [`authenticate`]: verify the `Authorization` header through an
//!   [`AuthorityClient`] and place an [`AuthContext`] in the request.
//! - [`authorize`]: enforce a statically bound rule against the caller itself.
//! - [`authorize_resource`]: fetch the entity named by a path parameter and
//!   enforce the rule against its owner.
//!
//! [`bearer`] and [`basic`] authenticate in-process and are used only by the
//! authority's own routes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use tollgate_auth::{BasicCredentials, OwnedResource, ResourceStore, Rule, TokenAuthority};
use tollgate_core::{AppError, ErrCode, StoreError, UserId};

use crate::app::errors::ApiError;
use crate::authclient::AuthorityClient;
use crate::context::{AuthContext, Owned};

/// Shared state of the client-backed stages.
#[derive(Clone)]
pub struct GateState {
    pub client: Arc<dyn AuthorityClient>,
    /// Bound on every call a stage makes.
    pub timeout: Duration,
}

impl GateState {
    pub fn new(client: Arc<dyn AuthorityClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// This gate with a rule bound, for [`authorize`].
    pub fn with_rule(&self, rule: Rule) -> RuleGate {
        RuleGate {
            gate: self.clone(),
            rule,
        }
    }

    async fn authorize(
        &self,
        claims: &tollgate_auth::Claims,
        user_id: UserId,
        rule: &Rule,
    ) -> Result<(), ApiError> {
        tokio::time::timeout(self.timeout, self.client.authorize(claims, user_id, rule))
            .await
            .map_err(|_| unreachable_timeout())??;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RuleGate {
    gate: GateState,
    rule: Rule,
}

/// State of [`authorize_resource`]: where to find the entity and how to treat
/// store failures.
pub struct ResourceGate<S> {
    gate: GateState,
    store: Arc<S>,
    rule: Rule,
    param: &'static str,
    on_backend_error: ErrCode,
}

impl<S> Clone for ResourceGate<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            store: self.store.clone(),
            rule: self.rule.clone(),
            param: self.param,
            on_backend_error: self.on_backend_error,
        }
    }
}

impl<S> ResourceGate<S> {
    /// Gate on the entity named by path parameter `param`. Store failures
    /// other than not-found surface as `Unauthenticated` unless changed with
    /// [`ResourceGate::backend_errors_as`].
    pub fn new(gate: GateState, store: Arc<S>, param: &'static str, rule: Rule) -> Self {
        Self {
            gate,
            store,
            rule,
            param,
            on_backend_error: ErrCode::Unauthenticated,
        }
    }

    pub fn backend_errors_as(mut self, code: ErrCode) -> Self {
        self.on_backend_error = code;
        self
    }
}

pub async fn authenticate(
    State(state): State<GateState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = authorization(req.headers())?.to_string();

    let verified = tokio::time::timeout(state.timeout, state.client.authenticate(&header))
        .await
        .map_err(|_| unreachable_timeout())??;

    req.extensions_mut()
        .insert(AuthContext::new(verified.user_id, verified.claims));

    Ok(next.run(req).await)
}

pub async fn authorize(
    State(state): State<RuleGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = auth_context(&req)?;

    state.gate.authorize(&ctx.claims, ctx.user_id, &state.rule).await?;

    Ok(next.run(req).await)
}

pub async fn authorize_resource<S>(
    State(state): State<ResourceGate<S>>,
    params: Option<Path<HashMap<String, String>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ResourceStore + 'static,
{
    let ctx = auth_context(&req)?;

    let raw_id = params.and_then(|Path(mut p)| p.remove(state.param));

    let target = match raw_id {
        None => UserId::nil(),
        Some(raw) => {
            let id: S::Id = raw
                .parse()
                .map_err(|_| ApiError::unauthenticated("ID is not in its proper form"))?;

            let lookup =
                tokio::time::timeout(state.gate.timeout, state.store.query_by_id(id)).await;
            let resource = match lookup {
                Ok(Ok(resource)) => resource,
                Ok(Err(StoreError::NotFound)) => {
                    tracing::info!(kind = S::KIND, %id, "resource not found during authorization");
                    return Err(ApiError::unauthenticated(format!("{} not found", S::KIND)));
                }
                Ok(Err(e)) => {
                    return Err(backend_error::<S>(state.on_backend_error, id, e.to_string()));
                }
                Err(_) => {
                    let reason = "timed out".to_string();
                    return Err(backend_error::<S>(state.on_backend_error, id, reason));
                }
            };

            let owner = resource.owner_id();
            req.extensions_mut().insert(Owned(resource));
            owner
        }
    };

    state.gate.authorize(&ctx.claims, target, &state.rule).await?;

    Ok(next.run(req).await)
}

/// Authenticate a bearer token directly against the authority.
pub async fn bearer(
    State(authority): State<Arc<TokenAuthority>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = authorization(req.headers())?;

    let claims = authority.authenticate(header).await?;
    let user_id = claims
        .subject_id()
        .map_err(|e| ApiError::unauthenticated(e.to_string()))?;

    req.extensions_mut().insert(AuthContext::new(user_id, claims));

    Ok(next.run(req).await)
}

/// Exchange `Authorization: Basic` credentials for claims.
pub async fn basic(
    State(authority): State<Arc<TokenAuthority>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = authorization(req.headers())?;
    let credentials =
        BasicCredentials::parse(header).map_err(|e| ApiError::unauthenticated(e.to_string()))?;

    let claims = authority.exchange_basic(&credentials).await?;
    let user_id = claims
        .subject_id()
        .map_err(|e| ApiError::unauthenticated(e.to_string()))?;

    req.extensions_mut().insert(AuthContext::new(user_id, claims));

    Ok(next.run(req).await)
}

fn authorization(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::unauthenticated("authorization header missing"))
}

fn auth_context(req: &Request) -> Result<AuthContext, ApiError> {
    req.extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| {
            ApiError::new(
                ErrCode::Internal,
                "claims missing from context: authorize called without authenticate",
            )
        })
}

fn unreachable_timeout() -> ApiError {
    ApiError(AppError::new(ErrCode::Unavailable, "authority unreachable: timed out"))
}

fn backend_error<S: ResourceStore>(code: ErrCode, id: S::Id, reason: String) -> ApiError {
    tracing::warn!(kind = S::KIND, %id, %reason, "resource lookup failed during authorization");
    ApiError::new(code, format!("query {}[{id}]: {reason}", S::KIND))
}
