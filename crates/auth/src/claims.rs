use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tollgate_core::{InvalidId, UserId};

use crate::Role;

/// Claims carried inside a signed token.
///
/// Field names on the wire are the registered JWT names (`sub`, `iss`, `iat`,
/// `nbf`, `exp`) plus the custom `roles` array. Timestamps are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the string form of the user id.
    pub sub: String,

    /// Issuer the token was minted by.
    pub iss: String,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(
        rename = "nbf",
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub not_before: Option<DateTime<Utc>>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("not_before is at or after expires_at")]
    NotBeforeAfterExpiry,
}

impl Claims {
    /// Build claims valid from `issued_at` for `ttl`.
    ///
    /// Timestamps are truncated to whole seconds so the value survives a
    /// sign/verify round trip unchanged.
    pub fn new(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        roles: Vec<Role>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let issued_at = issued_at.trunc_subsecs(0);
        Self {
            sub: subject.into(),
            iss: issuer.into(),
            roles,
            issued_at,
            not_before: None,
            expires_at: issued_at + ttl,
        }
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before.trunc_subsecs(0));
        self
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The subject parsed as a user id.
    pub fn subject_id(&self) -> Result<UserId, InvalidId> {
        self.sub.parse()
    }

    /// Structural check of the validity window, independent of the clock.
    pub fn validate_window(&self) -> Result<(), ClaimsError> {
        if self.expires_at <= self.issued_at {
            return Err(ClaimsError::InvalidTimeWindow);
        }
        if let Some(nbf) = self.not_before {
            if nbf >= self.expires_at {
                return Err(ClaimsError::NotBeforeAfterExpiry);
            }
        }
        Ok(())
    }
}
