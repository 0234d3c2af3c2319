//! `tollgate-auth`: token issuance, verification and access policy.
//!
//! This crate is decoupled from HTTP. Key material, users and owned resources
//! are reached through traits so the authority can be fronted by any
//! transport and backed by any store.

pub mod authority;
pub mod basic;
pub mod claims;
pub mod keys;
pub mod policy;
pub mod resource;
pub mod roles;
pub mod rules;
pub mod token;
pub mod user;

pub use authority::{AuthError, BASIC_TOKEN_TTL_HOURS, DEFAULT_LOOKUP_TIMEOUT, TokenAuthority};
pub use basic::{BasicAuthError, BasicCredentials};
pub use claims::{Claims, ClaimsError};
pub use keys::{KeyError, KeyPair, KeyResolver, KeyStore, PrivateKey, PublicKey};
pub use policy::{
    Decision, DocumentPolicy, NativePolicy, PolicyError, PolicyEvaluator, SignatureParams,
};
pub use resource::{OwnedResource, ResourceStore};
pub use roles::Role;
pub use rules::Rule;
pub use token::{TokenParseError, UnverifiedToken, parse_unverified};
pub use user::{UserRecord, UserStore};
