//! HTTP API: the authority endpoints, the client other services use to reach
//! them, and the gatekeeping middleware in front of business routes.

pub mod app;
pub mod authclient;
pub mod config;
pub mod context;
pub mod middleware;
