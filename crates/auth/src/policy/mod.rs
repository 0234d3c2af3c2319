//! Policy evaluation.
//!
//! Both authentication (is this token genuine?) and authorization (may this
//! role/subject combination do this?) are answered by a [`PolicyEvaluator`].
//! The authority holds one evaluator for each question and does not know
//! which implementation it was given.

mod document;
mod native;
mod signature;

pub use document::{Clause, DEFAULT_DOCUMENT, DocumentPolicy};
pub use native::NativePolicy;
pub use signature::SignatureParams;

use thiserror::Error;

use tollgate_core::UserId;

use crate::keys::PublicKey;
use crate::{Role, Rule};

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// The rule was not satisfied. Carries the reason for diagnostics.
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Denial used when a rule produces no result at all.
    pub(crate) fn no_results() -> Self {
        Decision::Deny("no results".to_string())
    }
}

/// Evaluation failed for reasons unrelated to the input's merit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy compilation: {0}")]
    Compile(String),

    #[error("policy evaluation: {0}")]
    Evaluation(String),
}

/// Input for the authentication rule.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationInput<'a> {
    pub key: &'a PublicKey,
    pub token: &'a str,
    pub issuer: &'a str,
}

/// Input for authorization rules.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationInput<'a> {
    pub roles: &'a [Role],
    /// Subject of the calling identity (the claims' `sub`).
    pub subject: &'a str,
    /// Subject the rule is evaluated against, e.g. the owner of a resource.
    pub user_id: UserId,
}

impl AuthorizationInput<'_> {
    pub(crate) fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub(crate) fn subject_is_target(&self) -> bool {
        self.subject == self.user_id.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PolicyInput<'a> {
    Authentication(AuthenticationInput<'a>),
    Authorization(AuthorizationInput<'a>),
}

/// Pluggable rule evaluation against structured input.
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, rule: &Rule, input: &PolicyInput<'_>) -> Result<Decision, PolicyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "5cf37266-3473-4006-984f-9325122678b7";
    const BOB: &str = "45b5fbd3-755f-4379-8f07-a58d4a30fa2f";

    fn evaluators() -> Vec<(&'static str, Box<dyn PolicyEvaluator>)> {
        vec![
            ("native", Box::new(NativePolicy::default())),
            ("document", Box::new(DocumentPolicy::compile(DEFAULT_DOCUMENT).unwrap())),
        ]
    }

    fn allowed(p: &dyn PolicyEvaluator, rule: &Rule, roles: &[Role], target: &str) -> bool {
        let input = PolicyInput::Authorization(AuthorizationInput {
            roles,
            subject: ALICE,
            user_id: target.parse().unwrap(),
        });
        p.evaluate(rule, &input).unwrap().is_allowed()
    }

    #[test]
    fn evaluators_agree_on_the_builtin_rules() {
        let role_sets: [&[Role]; 4] = [
            &[],
            &[Role::ADMIN],
            &[Role::USER],
            &[Role::ADMIN, Role::USER],
        ];
        let rules = [Rule::ANY, Rule::ADMIN_ONLY, Rule::USER_ONLY, Rule::ADMIN_OR_SUBJECT];
        let nil = UserId::nil().to_string();

        let all = evaluators();
        let (_, native) = &all[0];
        let (_, document) = &all[1];

        for rule in &rules {
            for roles in role_sets {
                for target in [ALICE, BOB, nil.as_str()] {
                    assert_eq!(
                        allowed(native.as_ref(), rule, roles, target),
                        allowed(document.as_ref(), rule, roles, target),
                        "rule {rule} roles {roles:?} target {target}",
                    );
                }
            }
        }
    }

    #[test]
    fn role_gating() {
        for (name, p) in evaluators() {
            let p = p.as_ref();
            assert!(allowed(p, &Rule::ADMIN_ONLY, &[Role::ADMIN], ALICE), "{name}");
            assert!(!allowed(p, &Rule::USER_ONLY, &[Role::ADMIN], ALICE), "{name}");
            assert!(allowed(p, &Rule::USER_ONLY, &[Role::USER], ALICE), "{name}");
            assert!(!allowed(p, &Rule::ADMIN_ONLY, &[Role::USER], ALICE), "{name}");
            assert!(allowed(p, &Rule::ANY, &[], ALICE), "{name}");
        }
    }

    #[test]
    fn ownership_rule() {
        for (name, p) in evaluators() {
            let p = p.as_ref();
            assert!(allowed(p, &Rule::ADMIN_OR_SUBJECT, &[], ALICE), "{name}");
            assert!(allowed(p, &Rule::ADMIN_OR_SUBJECT, &[Role::USER], ALICE), "{name}");
            assert!(!allowed(p, &Rule::ADMIN_OR_SUBJECT, &[Role::USER], BOB), "{name}");
            assert!(allowed(p, &Rule::ADMIN_OR_SUBJECT, &[Role::ADMIN], BOB), "{name}");
        }
    }

    #[test]
    fn unknown_rule_is_a_denial_not_an_error() {
        let roles = [Role::ADMIN];
        for (name, p) in evaluators() {
            let input = PolicyInput::Authorization(AuthorizationInput {
                roles: &roles,
                subject: ALICE,
                user_id: UserId::nil(),
            });
            let decision = p.evaluate(&Rule::new("rule_nobody"), &input).unwrap();
            assert_eq!(decision, Decision::no_results(), "{name}");
        }
    }
}
