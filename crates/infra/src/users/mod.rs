//! User stores.

pub mod cached;
pub mod in_memory;

pub use cached::{CachedUserStore, DEFAULT_TTL};
pub use in_memory::{InMemoryUserStore, SeedError, UserSeed};
