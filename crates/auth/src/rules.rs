use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Name of an authorization (or authentication) rule.
///
/// A rule is evaluated, never parsed: its meaning lives in whichever policy
/// evaluator the authority was built with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(Cow<'static, str>);

impl Rule {
    /// Signature and issuer check for a bearer token.
    pub const AUTHENTICATE: Rule = Rule(Cow::Borrowed("auth"));
    /// Any authenticated caller.
    pub const ANY: Rule = Rule(Cow::Borrowed("rule_any"));
    pub const ADMIN_ONLY: Rule = Rule(Cow::Borrowed("rule_admin_only"));
    pub const USER_ONLY: Rule = Rule(Cow::Borrowed("rule_user_only"));
    /// Admin role, or the caller is the target subject.
    pub const ADMIN_OR_SUBJECT: Rule = Rule(Cow::Borrowed("rule_admin_or_subject"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Rule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
