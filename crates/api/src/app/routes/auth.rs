//! Authority endpoints: token issuance, authentication and authorization.

use axum::{
    extract::{Extension, Path, State, rejection::JsonRejection},
    http::StatusCode,
    Json,
};

use tollgate_core::AppError;

use crate::app::AuthorityState;
use crate::app::dto::{AuthenticateResponse, AuthorizeRequest, TokenResponse};
use crate::app::errors::ApiError;
use crate::context::AuthContext;

/// Sign the caller's claims with the key named in the path.
pub async fn token(
    State(state): State<AuthorityState>,
    Extension(ctx): Extension<AuthContext>,
    Path(kid): Path<String>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.authority.issue_token(&kid, &ctx.claims)?;
    Ok(Json(TokenResponse { token }))
}

/// Sign the caller's claims with the active key.
pub async fn token_with_active_kid(
    State(state): State<AuthorityState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(kid) = state.keys.active_kid() else {
        return Err(AppError::invalid_argument("missing kid")
            .with_field("kid", "no active signing key is designated")
            .into());
    };
    let token = state.authority.issue_token(&kid, &ctx.claims)?;
    Ok(Json(TokenResponse { token }))
}

pub async fn authenticate(Extension(ctx): Extension<AuthContext>) -> Json<AuthenticateResponse> {
    Json(AuthenticateResponse {
        user_id: ctx.user_id,
        claims: ctx.claims,
    })
}

pub async fn authorize(
    State(state): State<AuthorityState>,
    body: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body.map_err(|e| ApiError(AppError::invalid_argument(e.body_text())))?;

    if let Err(e) = state.authority.authorize(&req.claims, req.user_id, &req.rule) {
        tracing::info!(
            rule = %req.rule,
            user_id = %req.user_id,
            sub = %req.claims.sub,
            "authorize denied"
        );
        return Err(e.into());
    }

    Ok(StatusCode::NO_CONTENT)
}
