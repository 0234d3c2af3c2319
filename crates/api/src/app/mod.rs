//! HTTP API application wiring (Axum routers + service wiring).
//!
//! - `services.rs`: key store, authority, user/resource stores, authority client
//! - `routes/`: HTTP handlers (one file per area)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;

use tollgate_auth::{KeyStore, Rule, TokenAuthority};
use tollgate_core::ErrCode;
use tollgate_infra::{HomeStore, InMemoryUserStore, ProductStore};

use crate::middleware::{self, ResourceGate};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// State of the authority routes.
#[derive(Clone)]
pub struct AuthorityState {
    pub authority: Arc<TokenAuthority>,
    pub keys: Arc<KeyStore>,
}

/// Routes served by the process hosting the token authority.
pub fn build_authority_app(state: AuthorityState) -> Router {
    let issue = Router::new()
        .route("/v1/auth/token", get(routes::auth::token_with_active_kid))
        .route("/v1/auth/token/:kid", get(routes::auth::token))
        .route_layer(from_fn_with_state(state.authority.clone(), middleware::basic));

    let verify = Router::new()
        .route("/v1/auth/authenticate", get(routes::auth::authenticate))
        .route_layer(from_fn_with_state(state.authority.clone(), middleware::bearer));

    Router::new()
        .route("/v1/liveness", get(routes::system::liveness))
        .route("/v1/auth/authorize", post(routes::auth::authorize))
        .merge(issue)
        .merge(verify)
        .with_state(state)
}

/// Demonstration business routes behind the gatekeeping middleware.
///
/// Authentication runs first for every route; each route then binds its own
/// authorization stage.
pub fn build_gated_app(services: AppServices) -> Router {
    let gate = services.gate.clone();

    let users_list = get(routes::users::list_users)
        .route_layer(from_fn_with_state(gate.with_rule(Rule::ADMIN_ONLY), middleware::authorize));

    let user = get(routes::users::get_user).route_layer(from_fn_with_state(
        ResourceGate::new(gate.clone(), services.users.clone(), "user_id", Rule::ADMIN_OR_SUBJECT),
        middleware::authorize_resource::<InMemoryUserStore>,
    ));

    let product = get(routes::products::get_product).route_layer(from_fn_with_state(
        ResourceGate::new(
            gate.clone(),
            services.products.clone(),
            "product_id",
            Rule::ADMIN_OR_SUBJECT,
        )
        .backend_errors_as(ErrCode::Internal),
        middleware::authorize_resource::<ProductStore>,
    ));

    // Without the path parameter the target is the nil id, so the bound rule
    // alone decides.
    let products = get(routes::products::list_products).route_layer(from_fn_with_state(
        ResourceGate::new(gate.clone(), services.products.clone(), "product_id", Rule::ADMIN_ONLY),
        middleware::authorize_resource::<ProductStore>,
    ));

    let homes = get(routes::homes::list_homes).route_layer(from_fn_with_state(
        ResourceGate::new(gate.clone(), services.homes.clone(), "home_id", Rule::ANY),
        middleware::authorize_resource::<HomeStore>,
    ));

    let home = get(routes::homes::get_home).route_layer(from_fn_with_state(
        ResourceGate::new(gate.clone(), services.homes.clone(), "home_id", Rule::ADMIN_OR_SUBJECT),
        middleware::authorize_resource::<HomeStore>,
    ));

    Router::new()
        .route("/v1/users", users_list)
        .route("/v1/users/:user_id", user)
        .route("/v1/products", products)
        .route("/v1/products/:product_id", product)
        .route("/v1/homes", homes)
        .route("/v1/homes/:home_id", home)
        .route_layer(from_fn_with_state(gate, middleware::authenticate))
        .layer(Extension(services))
}

/// Full router of the binary: authority routes plus the gated routes.
pub fn build_app(services: AppServices) -> Router {
    let authority = build_authority_app(AuthorityState {
        authority: services.authority.clone(),
        keys: services.keys.clone(),
    });

    Router::new()
        .merge(authority)
        .merge(build_gated_app(services))
        .layer(ServiceBuilder::new())
}
