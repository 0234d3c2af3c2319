use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use tollgate_api::app::{self, AppServices, AuthorityState};
use tollgate_api::authclient::{AuthorityClient, HttpAuthorityClient};
use tollgate_api::middleware::GateState;
use tollgate_auth::{Claims, KeyStore, Role, TokenAuthority, UserRecord};
use tollgate_core::{HomeId, ProductId, UserId};
use tollgate_infra::{
    CachedUserStore, HomeRecord, HomeStore, InMemoryUserStore, ProductRecord, ProductStore,
};

const KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";
const ISSUER: &str = "service project";
const TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(app: axum::Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Fixture {
    authority: TestServer,
    gated: TestServer,
    signer: Arc<TokenAuthority>,
    admin: UserRecord,
    user: UserRecord,
    disabled: UserRecord,
    product: ProductRecord,
    home: HomeRecord,
    products: Arc<ProductStore>,
}

fn keys_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../auth/testdata/keys")
}

/// An authority server and a gated server that reaches it over HTTP.
async fn fixture() -> Fixture {
    let keys = Arc::new(KeyStore::new());
    keys.load_dir(keys_dir()).unwrap();
    keys.set_active(KID).unwrap();

    let users = Arc::new(InMemoryUserStore::with_cost(4));
    let admin = users
        .add_user("admin@example.com", "gophers", vec![Role::ADMIN, Role::USER])
        .unwrap();
    let user = users.add_user("user@example.com", "gophers", vec![Role::USER]).unwrap();
    let disabled = users.add_user("gone@example.com", "gophers", vec![Role::USER]).unwrap();
    users.set_enabled(disabled.id, false);

    let authority = Arc::new(
        TokenAuthority::new(keys.clone(), ISSUER)
            .with_user_store(Arc::new(CachedUserStore::with_ttl(users.clone(), Duration::ZERO))),
    );

    let authority_srv = TestServer::spawn(app::build_authority_app(AuthorityState {
        authority: authority.clone(),
        keys: keys.clone(),
    }))
    .await;

    let products = Arc::new(ProductStore::new());
    let product = ProductRecord {
        id: ProductId::new(),
        owner_id: admin.id,
        name: "Comic Books".into(),
        cost: 50.0,
        quantity: 42,
    };
    products.upsert(product.clone());

    let homes = Arc::new(HomeStore::new());
    let home = HomeRecord {
        id: HomeId::new(),
        owner_id: user.id,
        address: "123 Mockingbird Lane".into(),
    };
    homes.upsert(home.clone());

    let client: Arc<dyn AuthorityClient> =
        Arc::new(HttpAuthorityClient::new(authority_srv.base_url.clone(), TIMEOUT).unwrap());

    let services = AppServices {
        keys,
        authority: authority.clone(),
        users,
        products: products.clone(),
        homes,
        gate: GateState::new(client, TIMEOUT),
    };
    let gated = TestServer::spawn(app::build_gated_app(services)).await;

    Fixture {
        authority: authority_srv,
        gated,
        signer: authority,
        admin,
        user,
        disabled,
        product,
        home,
        products,
    }
}

impl Fixture {
    fn token_for(&self, user: &UserRecord) -> String {
        let claims = Claims::new(
            user.id.to_string(),
            ISSUER,
            user.roles.clone(),
            Utc::now(),
            ChronoDuration::hours(1),
        );
        self.signer.issue_token(KID, &claims).unwrap()
    }

    async fn get_authority(&self, path: &str, token: &str) -> (StatusCode, Value) {
        get(&format!("{}{path}", self.authority.base_url), token).await
    }

    async fn get_gated(&self, path: &str, token: &str) -> (StatusCode, Value) {
        get(&format!("{}{path}", self.gated.base_url), token).await
    }
}

async fn get(url: &str, token: &str) -> (StatusCode, Value) {
    let res = reqwest::Client::new()
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn liveness_reports_up() {
    let fx = fixture().await;
    let res = reqwest::get(format!("{}/v1/liveness", fx.authority.base_url))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": "up"}));
}

#[tokio::test]
async fn basic_credentials_to_token_to_claims() {
    let fx = fixture().await;

    let res = reqwest::Client::new()
        .get(format!("{}/v1/auth/token/{KID}", fx.authority.base_url))
        .basic_auth("admin@example.com", Some("gophers"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let header = jsonwebtoken::decode_header(&token).unwrap();
    assert_eq!(header.kid.as_deref(), Some(KID));
    assert_eq!(header.alg, jsonwebtoken::Algorithm::RS256);

    let (status, body) = fx.get_authority("/v1/auth/authenticate", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userID"], fx.admin.id.to_string());
    assert_eq!(body["claims"]["sub"], fx.admin.id.to_string());
    assert_eq!(body["claims"]["iss"], ISSUER);
    assert_eq!(body["claims"]["roles"], json!(["ADMIN", "USER"]));

    let exp = body["claims"]["exp"].as_i64().unwrap();
    let iat = body["claims"]["iat"].as_i64().unwrap();
    assert_eq!(exp - iat, 8760 * 3600);
}

#[tokio::test]
async fn token_without_kid_uses_the_active_key() {
    let fx = fixture().await;
    let res = reqwest::Client::new()
        .get(format!("{}/v1/auth/token", fx.authority.base_url))
        .basic_auth("user@example.com", Some("gophers"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let header = jsonwebtoken::decode_header(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(header.kid.as_deref(), Some(KID));
}

#[tokio::test]
async fn token_issuance_failures() {
    let fx = fixture().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/v1/auth/token/{KID}", fx.authority.base_url))
        .basic_auth("admin@example.com", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "unauthenticated");

    let res = client
        .get(format!("{}/v1/auth/token/{KID}", fx.authority.base_url))
        .basic_auth("gone@example.com", Some("gophers"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/v1/auth/token/no-such-kid", fx.authority.base_url))
        .basic_auth("admin@example.com", Some("gophers"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "internal");

    let res = client
        .get(format!("{}/v1/auth/token/{KID}", fx.authority.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn disabled_user_cannot_authenticate() {
    let fx = fixture().await;
    let token = fx.token_for(&fx.disabled);

    let (status, body) = fx.get_authority("/v1/auth/authenticate", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "user disabled");
}

#[tokio::test]
async fn authorize_endpoint_decides_by_rule() {
    let fx = fixture().await;
    let client = reqwest::Client::new();
    let url = format!("{}/v1/auth/authorize", fx.authority.base_url);

    let claims = Claims::new(
        fx.user.id.to_string(),
        ISSUER,
        vec![Role::USER],
        Utc::now(),
        ChronoDuration::hours(1),
    );

    let res = client
        .post(&url)
        .json(&json!({"userID": fx.user.id, "claims": claims, "rule": "rule_user_only"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(&url)
        .json(&json!({"userID": fx.user.id, "claims": claims, "rule": "rule_admin_only"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "unauthenticated");
    let message = body["message"].as_str().unwrap();
    assert!(
        message.starts_with(
            "authorize: you are not authorized for that action, claims[USER] rule[rule_admin_only]"
        ),
        "{message}"
    );

    let res = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{\"rule\": 7}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "invalid_argument");
}

#[tokio::test]
async fn owner_and_admin_reach_owned_resources() {
    let fx = fixture().await;
    let home = format!("/v1/homes/{}", fx.home.id);

    let (status, body) = fx.get_gated(&home, &fx.token_for(&fx.user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], "123 Mockingbird Lane");

    let (status, _) = fx.get_gated(&home, &fx.token_for(&fx.admin)).await;
    assert_eq!(status, StatusCode::OK);

    let user = format!("/v1/users/{}", fx.user.id);
    let (status, body) = fx.get_gated(&user, &fx.token_for(&fx.user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "user@example.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn non_owner_is_denied_with_rule_and_subjects() {
    let fx = fixture().await;
    let product = format!("/v1/products/{}", fx.product.id);
    let (status, body) = fx.get_gated(&product, &fx.token_for(&fx.user)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("rule[rule_admin_or_subject]"), "{message}");
    assert!(message.contains(&fx.user.id.to_string()), "{message}");
    assert!(message.contains(&fx.admin.id.to_string()), "{message}");
}

#[tokio::test]
async fn missing_or_malformed_resources_do_not_leak_existence() {
    let fx = fixture().await;
    let token = fx.token_for(&fx.admin);

    let unknown = format!("/v1/products/{}", ProductId::new());
    let (status, body) = fx.get_gated(&unknown, &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, body) = fx.get_gated("/v1/products/not-a-uuid", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "ID is not in its proper form");

    let (status, _) = fx.get_gated(&format!("/v1/users/{}", UserId::new()), &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn product_store_failure_is_internal() {
    let fx = fixture().await;
    fx.products.set_failure(Some("connection reset".into()));

    let product = format!("/v1/products/{}", fx.product.id);
    let (status, body) = fx.get_gated(&product, &fx.token_for(&fx.admin)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal");
}

#[tokio::test]
async fn simple_authorize_binds_the_route_rule() {
    let fx = fixture().await;

    let (status, _) = fx.get_gated("/v1/users", &fx.token_for(&fx.user)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = fx.get_gated("/v1/users", &fx.token_for(&fx.admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn resource_gate_without_an_id_applies_the_bound_rule() {
    let fx = fixture().await;

    let (status, body) = fx.get_gated("/v1/products", &fx.token_for(&fx.user)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("rule[rule_admin_only]"), "{message}");

    let (status, body) = fx.get_gated("/v1/products", &fx.token_for(&fx.admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Comic Books");

    let (status, body) = fx.get_gated("/v1/homes", &fx.token_for(&fx.user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["address"], "123 Mockingbird Lane");
}

#[tokio::test]
async fn remote_denial_message_survives_the_hop() {
    let fx = fixture().await;
    let garbage = "not-a-token";
    let home = format!("/v1/homes/{}", fx.home.id);

    let (direct_status, direct) = fx.get_authority("/v1/auth/authenticate", garbage).await;
    let (gated_status, gated) = fx.get_gated(&home, garbage).await;

    assert_eq!(direct_status, StatusCode::UNAUTHORIZED);
    assert_eq!(gated_status, StatusCode::UNAUTHORIZED);
    assert_eq!(gated, direct);

    let res = reqwest::Client::new()
        .get(format!("{}{home}", fx.gated.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unreachable_authority_is_unavailable_not_denied() {
    let fx = fixture().await;

    // Reserve a port, then close it so nothing listens there.
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let client: Arc<dyn AuthorityClient> =
        Arc::new(HttpAuthorityClient::new(format!("http://{closed}"), TIMEOUT).unwrap());
    let services = AppServices {
        keys: Arc::new(KeyStore::new()),
        authority: fx.signer.clone(),
        users: Arc::new(InMemoryUserStore::with_cost(4)),
        products: Arc::new(ProductStore::new()),
        homes: Arc::new(HomeStore::new()),
        gate: GateState::new(client, TIMEOUT),
    };
    let srv = TestServer::spawn(app::build_gated_app(services)).await;

    let url = format!("{}/v1/homes/{}", srv.base_url, fx.home.id);
    let (status, body) = get(&url, &fx.token_for(&fx.user)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "unavailable");
}
