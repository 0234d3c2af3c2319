//! Unverified token inspection.
//!
//! Reads the header kid and the claims of a compact JWS *without* checking
//! the signature. Nothing returned from here may be trusted until the
//! authentication policy has accepted the same token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use thiserror::Error;

use crate::Claims;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenParseError {
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("kid missing from header")]
    KidMissing,

    #[error("kid malformed")]
    KidMalformed,
}

/// Header kid and claims of a token whose signature has not been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedToken {
    pub kid: String,
    pub claims: Claims,
}

pub fn parse_unverified(token: &str) -> Result<UnverifiedToken, TokenParseError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenParseError::Malformed("expected three segments".into()));
    };

    let header: Value = decode_segment(header, "header")?;
    let kid = match header.get("kid") {
        None | Some(Value::Null) => return Err(TokenParseError::KidMissing),
        Some(Value::String(kid)) if !kid.trim().is_empty() => kid.clone(),
        Some(_) => return Err(TokenParseError::KidMalformed),
    };

    let claims: Claims = decode_segment(payload, "claims")?;

    Ok(UnverifiedToken { kid, claims })
}

fn decode_segment<T: serde::de::DeserializeOwned>(
    segment: &str,
    what: &str,
) -> Result<T, TokenParseError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenParseError::Malformed(format!("{what}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenParseError::Malformed(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(value: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&value).unwrap())
    }

    fn payload() -> String {
        segment(serde_json::json!({
            "sub": "5cf37266-3473-4006-984f-9325122678b7",
            "iss": "service project",
            "roles": ["USER"],
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
        }))
    }

    #[test]
    fn extracts_kid_and_claims() {
        let header = segment(serde_json::json!({"alg": "RS256", "kid": "k1"}));
        let token = format!("{header}.{}.sig", payload());
        let parsed = parse_unverified(&token).unwrap();
        assert_eq!(parsed.kid, "k1");
        assert_eq!(parsed.claims.iss, "service project");
    }

    #[test]
    fn missing_kid() {
        let header = segment(serde_json::json!({"alg": "RS256"}));
        let token = format!("{header}.{}.sig", payload());
        assert_eq!(parse_unverified(&token), Err(TokenParseError::KidMissing));
    }

    #[test]
    fn non_string_kid_is_malformed() {
        let header = segment(serde_json::json!({"alg": "RS256", "kid": 42}));
        let token = format!("{header}.{}.sig", payload());
        assert_eq!(parse_unverified(&token), Err(TokenParseError::KidMalformed));

        let header = segment(serde_json::json!({"alg": "RS256", "kid": " "}));
        let token = format!("{header}.{}.sig", payload());
        assert_eq!(parse_unverified(&token), Err(TokenParseError::KidMalformed));
    }

    #[test]
    fn wrong_segment_count() {
        assert!(matches!(parse_unverified("abc.def"), Err(TokenParseError::Malformed(_))));
        assert!(matches!(parse_unverified("a.b.c.d"), Err(TokenParseError::Malformed(_))));
    }
}
