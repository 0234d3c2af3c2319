//! Infrastructure layer: the stores the authority and the gatekeeping
//! middleware consult.
//!
//! Everything here is in-memory and intended for a single process. The
//! traits live in `tollgate-auth`; swapping in a database-backed store does
//! not touch callers.

pub mod resources;
pub mod users;

pub use resources::{
    HomeRecord, HomeStore, InMemoryResourceStore, Keyed, ProductRecord, ProductStore,
};
pub use users::{CachedUserStore, InMemoryUserStore, SeedError, UserSeed};
