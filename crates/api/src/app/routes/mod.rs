pub mod auth;
pub mod homes;
pub mod products;
pub mod system;
pub mod users;
