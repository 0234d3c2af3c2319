//! Policy-as-data.
//!
//! A JSON document with an optional `authentication` section (parameters of
//! the signature check) and a `rules` map from rule name to clauses. A rule
//! is satisfied when any one of its clauses matches. The document is compiled
//! once; the compiled value is what gets evaluated.

use std::collections::HashMap;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use super::signature::is_rsa;
use super::{
    AuthorizationInput, Decision, PolicyError, PolicyEvaluator, PolicyInput, SignatureParams,
};
use crate::{Role, Rule};

/// The document encoding the built-in rules, equivalent to [`super::NativePolicy`].
pub const DEFAULT_DOCUMENT: &str = include_str!("default.json");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    authentication: Option<RawAuthentication>,
    #[serde(default)]
    rules: HashMap<String, Vec<Clause>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuthentication {
    #[serde(default = "default_algorithms")]
    algorithms: Vec<Algorithm>,
    #[serde(default)]
    leeway_secs: u64,
    #[serde(default = "default_validate_nbf")]
    validate_nbf: bool,
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

fn default_validate_nbf() -> bool {
    true
}

/// One way of satisfying a rule. Every condition it names must hold; a clause
/// naming no condition never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Clause {
    /// Unconditional match.
    #[serde(default)]
    pub allow: bool,
    /// The caller holds at least one of these roles.
    #[serde(default)]
    pub roles_any: Vec<Role>,
    /// The caller holds every one of these roles.
    #[serde(default)]
    pub roles_all: Vec<Role>,
    /// The caller's subject equals the target user id.
    #[serde(default)]
    pub subject_is_target: bool,
}

impl Clause {
    fn names_a_condition(&self) -> bool {
        self.allow
            || !self.roles_any.is_empty()
            || !self.roles_all.is_empty()
            || self.subject_is_target
    }

    fn matches(&self, input: &AuthorizationInput<'_>) -> bool {
        if !self.names_a_condition() {
            return false;
        }
        if !self.roles_any.is_empty() && !self.roles_any.iter().any(|r| input.has_role(r)) {
            return false;
        }
        if !self.roles_all.iter().all(|r| input.has_role(r)) {
            return false;
        }
        if self.subject_is_target && !input.subject_is_target() {
            return false;
        }
        true
    }
}

/// Evaluator compiled from a policy document.
#[derive(Debug, Clone)]
pub struct DocumentPolicy {
    authentication: Option<SignatureParams>,
    rules: HashMap<String, Vec<Clause>>,
}

impl DocumentPolicy {
    /// Parse and check a document. Any defect is a compile error.
    pub fn compile(document: &str) -> Result<Self, PolicyError> {
        let raw: RawDocument =
            serde_json::from_str(document).map_err(|e| PolicyError::Compile(e.to_string()))?;

        let authentication = match raw.authentication {
            None => None,
            Some(auth) => {
                if auth.algorithms.is_empty() {
                    return Err(PolicyError::Compile("authentication.algorithms is empty".into()));
                }
                if let Some(alg) = auth.algorithms.iter().find(|a| !is_rsa(**a)) {
                    return Err(PolicyError::Compile(format!(
                        "algorithm {alg:?} cannot be verified with an RSA key"
                    )));
                }
                Some(SignatureParams {
                    algorithms: auth.algorithms,
                    leeway_secs: auth.leeway_secs,
                    validate_nbf: auth.validate_nbf,
                })
            }
        };

        for (name, clauses) in &raw.rules {
            if name.trim().is_empty() {
                return Err(PolicyError::Compile("rule with an empty name".into()));
            }
            if clauses.is_empty() {
                return Err(PolicyError::Compile(format!("rule {name} has no clauses")));
            }
        }

        Ok(Self {
            authentication,
            rules: raw.rules,
        })
    }

    /// Whether the document can answer the authentication rule.
    pub fn has_authentication(&self) -> bool {
        self.authentication.is_some()
    }

    pub fn has_rule(&self, rule: &Rule) -> bool {
        self.rules.contains_key(rule.as_str())
    }
}

impl PolicyEvaluator for DocumentPolicy {
    fn evaluate(&self, rule: &Rule, input: &PolicyInput<'_>) -> Result<Decision, PolicyError> {
        match input {
            PolicyInput::Authentication(input) => match &self.authentication {
                Some(params) if *rule == Rule::AUTHENTICATE => params.verify(input),
                _ => Ok(Decision::no_results()),
            },
            PolicyInput::Authorization(input) => {
                let Some(clauses) = self.rules.get(rule.as_str()) else {
                    return Ok(Decision::no_results());
                };
                if clauses.iter().any(|c| c.matches(input)) {
                    return Ok(Decision::Allow);
                }
                Ok(Decision::Deny(format!(
                    "no clause matched roles{:?} subject[{}] user[{}]",
                    input.roles.iter().map(Role::as_str).collect::<Vec<_>>(),
                    input.subject,
                    input.user_id
                )))
            }
        }
    }
}
