//! Client used by services to reach the token authority.
//!
//! The gatekeeping middleware only sees [`AuthorityClient`]. Whether the
//! authority runs in-process ([`LocalAuthority`]) or behind HTTP
//! ([`HttpAuthorityClient`]), failures arrive in the same taxonomy.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;

use tollgate_auth::{AuthError, Claims, Rule, TokenAuthority};
use tollgate_core::{AppError, ErrCode, UserId};

use crate::app::dto::{AuthenticateResponse, AuthorizeRequest};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The authority rejected the caller. Carries its payload verbatim.
    #[error("{0}")]
    Unauthenticated(AppError),

    /// The authority answered with an error that is not an authentication
    /// failure (in-process only).
    #[error("{0}")]
    Authority(AppError),

    #[error("authority unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected response from authority: status[{status}] body[{body}]")]
    Unexpected { status: u16, body: String },

    #[error("decoding authority response: {reason}: body[{body}]")]
    Decode { body: String, reason: String },
}

impl From<AuthError> for ClientError {
    fn from(value: AuthError) -> Self {
        match value.code() {
            ErrCode::Unauthenticated => ClientError::Unauthenticated(value.into()),
            _ => ClientError::Authority(value.into()),
        }
    }
}

impl From<ClientError> for AppError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Unauthenticated(e) | ClientError::Authority(e) => e,
            e @ ClientError::Unreachable(_) => AppError::new(ErrCode::Unavailable, e.to_string()),
            e @ (ClientError::Unexpected { .. } | ClientError::Decode { .. }) => {
                AppError::internal(e.to_string())
            }
        }
    }
}

/// Authentication and authorization as seen by a guarded service.
#[async_trait::async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Verify the raw `Authorization` header value.
    async fn authenticate(&self, authorization: &str) -> Result<AuthenticateResponse, ClientError>;

    async fn authorize(
        &self,
        claims: &Claims,
        user_id: UserId,
        rule: &Rule,
    ) -> Result<(), ClientError>;
}

/// In-process client over a shared [`TokenAuthority`].
#[derive(Debug, Clone)]
pub struct LocalAuthority {
    authority: Arc<TokenAuthority>,
}

impl LocalAuthority {
    pub fn new(authority: Arc<TokenAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait::async_trait]
impl AuthorityClient for LocalAuthority {
    async fn authenticate(&self, authorization: &str) -> Result<AuthenticateResponse, ClientError> {
        let claims = self.authority.authenticate(authorization).await?;
        let user_id = claims
            .subject_id()
            .map_err(|e| ClientError::Unauthenticated(AppError::unauthenticated(e.to_string())))?;
        Ok(AuthenticateResponse { user_id, claims })
    }

    async fn authorize(
        &self,
        claims: &Claims,
        user_id: UserId,
        rule: &Rule,
    ) -> Result<(), ClientError> {
        self.authority.authorize(claims, user_id, rule)?;
        Ok(())
    }
}

/// Client for an authority reached over HTTP.
///
/// Every call is bounded by the timeout given at construction. Nothing is
/// retried.
#[derive(Debug, Clone)]
pub struct HttpAuthorityClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpAuthorityClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request` and return the body of a 2xx response.
    async fn send(
        &self,
        method: &str,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, ClientError> {
        tracing::debug!(method, endpoint, "authority call started");

        let response = request.send().await.map_err(|e| {
            tracing::warn!(method, endpoint, error = %e, "authority call failed");
            ClientError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        tracing::debug!(method, endpoint, status = status.as_u16(), "authority call completed");

        match status {
            s if s.is_success() => Ok(body),
            StatusCode::UNAUTHORIZED => {
                let err = serde_json::from_str::<AppError>(&body)
                    .unwrap_or_else(|_| AppError::unauthenticated(body));
                Err(ClientError::Unauthenticated(err))
            }
            s => Err(ClientError::Unexpected {
                status: s.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait::async_trait]
impl AuthorityClient for HttpAuthorityClient {
    async fn authenticate(&self, authorization: &str) -> Result<AuthenticateResponse, ClientError> {
        let endpoint = format!("{}/v1/auth/authenticate", self.base_url);
        let request = self
            .http
            .get(&endpoint)
            .header(header::AUTHORIZATION, authorization);

        let body = self.send("GET", &endpoint, request).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            reason: e.to_string(),
            body,
        })
    }

    async fn authorize(
        &self,
        claims: &Claims,
        user_id: UserId,
        rule: &Rule,
    ) -> Result<(), ClientError> {
        let endpoint = format!("{}/v1/auth/authorize", self.base_url);
        let body = AuthorizeRequest {
            user_id,
            claims: claims.clone(),
            rule: rule.clone(),
        };
        let request = self.http.post(&endpoint).json(&body);

        self.send("POST", &endpoint, request).await?;
        Ok(())
    }
}
