use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};

use super::{AuthenticationInput, Decision, PolicyError};

/// Parameters of the signature/issuer check.
///
/// Kept as data so the accepted algorithms and clock handling can change
/// through a policy document without touching the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    pub algorithms: Vec<Algorithm>,
    pub leeway_secs: u64,
    pub validate_nbf: bool,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::RS256],
            leeway_secs: 0,
            validate_nbf: true,
        }
    }
}

impl SignatureParams {
    pub(crate) fn verify(&self, input: &AuthenticationInput<'_>) -> Result<Decision, PolicyError> {
        let Some(first) = self.algorithms.first() else {
            return Ok(Decision::Deny("no algorithms accepted".to_string()));
        };

        let key = input
            .key
            .decoding_key()
            .map_err(|e| PolicyError::Evaluation(format!("public key: {e}")))?;

        let mut validation = Validation::new(*first);
        validation.algorithms = self.algorithms.clone();
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = self.validate_nbf;
        validation.set_issuer(&[input.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        match jsonwebtoken::decode::<serde_json::Value>(input.token, &key, &validation) {
            Ok(_) => Ok(Decision::Allow),
            Err(e) => match e.kind() {
                ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) => {
                    Err(PolicyError::Evaluation(e.to_string()))
                }
                _ => Ok(Decision::Deny(e.to_string())),
            },
        }
    }
}

/// Whether `alg` can be verified with the RSA keys the key store holds.
pub(crate) fn is_rsa(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}
