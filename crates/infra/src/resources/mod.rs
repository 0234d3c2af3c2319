//! Owned domain entities consulted by resource-scoped authorization.
//!
//! These are the minimal shapes the middleware needs (an id and an owner);
//! the business data around them belongs to the owning services.

pub mod in_memory;

use serde::{Deserialize, Serialize};

use tollgate_auth::OwnedResource;
use tollgate_core::{HomeId, ProductId, UserId};

pub use in_memory::{InMemoryResourceStore, Keyed};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub owner_id: UserId,
    pub name: String,
    pub cost: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeRecord {
    pub id: HomeId,
    pub owner_id: UserId,
    pub address: String,
}

impl OwnedResource for ProductRecord {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }
}

impl OwnedResource for HomeRecord {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }
}

impl Keyed for ProductRecord {
    const KIND: &'static str = "product";
    type Id = ProductId;

    fn key(&self) -> ProductId {
        self.id
    }
}

impl Keyed for HomeRecord {
    const KIND: &'static str = "home";
    type Id = HomeId;

    fn key(&self) -> HomeId {
        self.id
    }
}

pub type ProductStore = InMemoryResourceStore<ProductRecord>;
pub type HomeStore = InMemoryResourceStore<HomeRecord>;
