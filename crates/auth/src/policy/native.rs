use super::{Decision, PolicyError, PolicyEvaluator, PolicyInput, SignatureParams};
use crate::{Role, Rule};

/// Rule table compiled into the binary.
///
/// Authentication is an RS256 signature + issuer check; authorization rules
/// are a `match` over the rule name. Unknown rules produce no result and are
/// therefore denied.
#[derive(Debug, Clone, Default)]
pub struct NativePolicy {
    signature: SignatureParams,
}

impl NativePolicy {
    pub fn new(signature: SignatureParams) -> Self {
        Self { signature }
    }
}

impl PolicyEvaluator for NativePolicy {
    fn evaluate(&self, rule: &Rule, input: &PolicyInput<'_>) -> Result<Decision, PolicyError> {
        match input {
            PolicyInput::Authentication(input) => {
                if *rule != Rule::AUTHENTICATE {
                    return Ok(Decision::no_results());
                }
                self.signature.verify(input)
            }
            PolicyInput::Authorization(input) => {
                let decision = match rule.as_str() {
                    "rule_any" => Decision::Allow,
                    "rule_admin_only" => require_role(input.has_role(&Role::ADMIN), &Role::ADMIN),
                    "rule_user_only" => require_role(input.has_role(&Role::USER), &Role::USER),
                    "rule_admin_or_subject" => {
                        if input.has_role(&Role::ADMIN) || input.subject_is_target() {
                            Decision::Allow
                        } else {
                            Decision::Deny(format!(
                                "subject[{}] is not user[{}] and role {} is not held",
                                input.subject,
                                input.user_id,
                                Role::ADMIN
                            ))
                        }
                    }
                    _ => Decision::no_results(),
                };
                Ok(decision)
            }
        }
    }
}

fn require_role(held: bool, role: &Role) -> Decision {
    if held {
        Decision::Allow
    } else {
        Decision::Deny(format!("role {role} is required"))
    }
}
