use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BasicAuthError {
    #[error("expected authorization header format: Basic <base64>")]
    Malformed,

    #[error("invalid email format")]
    InvalidEmail,
}

/// Email/password pair presented in an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("email", &self.email)
            .field("password", &"..")
            .finish()
    }
}

impl BasicCredentials {
    /// Parse `Basic <base64(email:password)>`.
    pub fn parse(header: &str) -> Result<Self, BasicAuthError> {
        let mut parts = header.split(' ');
        let (Some(scheme), Some(encoded), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(BasicAuthError::Malformed);
        };
        if scheme != "Basic" {
            return Err(BasicAuthError::Malformed);
        }

        let decoded = STANDARD.decode(encoded).map_err(|_| BasicAuthError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| BasicAuthError::Malformed)?;

        let Some((email, password)) = decoded.split_once(':') else {
            return Err(BasicAuthError::Malformed);
        };
        if !looks_like_email(email) {
            return Err(BasicAuthError::InvalidEmail);
        }

        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
}
