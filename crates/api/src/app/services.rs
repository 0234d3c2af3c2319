//! Wiring of the authority and the stores behind the gated routes.

use std::sync::Arc;

use anyhow::Context;

use tollgate_auth::{
    DocumentPolicy, KeyStore, NativePolicy, PolicyEvaluator, SignatureParams, TokenAuthority,
    UserStore,
};
use tollgate_infra::{CachedUserStore, HomeStore, InMemoryUserStore, ProductStore};

use crate::authclient::{AuthorityClient, HttpAuthorityClient, LocalAuthority};
use crate::config::Config;
use crate::middleware::GateState;

/// Everything the routers need, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub keys: Arc<KeyStore>,
    pub authority: Arc<TokenAuthority>,
    pub users: Arc<InMemoryUserStore>,
    pub products: Arc<ProductStore>,
    pub homes: Arc<HomeStore>,
    pub gate: GateState,
}

impl AppServices {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let keys = Arc::new(KeyStore::new());
        if config.keys_json.is_none() || config.keys_dir.exists() {
            keys.load_dir(&config.keys_dir)
                .with_context(|| format!("loading keys from {}", config.keys_dir.display()))?;
        }
        if let Some(document) = &config.keys_json {
            keys.load_json(document).context("loading keys_json")?;
        }
        let loaded = keys.len();
        if loaded == 0 {
            anyhow::bail!("no signing keys loaded");
        }
        if let Some(kid) = &config.active_kid {
            keys.set_active(kid)
                .with_context(|| format!("designating active kid {kid}"))?;
        }
        tracing::info!(keys = loaded, active_kid = ?keys.active_kid(), "key store ready");

        let native: Arc<dyn PolicyEvaluator> = Arc::new(NativePolicy::new(SignatureParams {
            leeway_secs: config.clock_leeway_secs,
            ..SignatureParams::default()
        }));
        let (authentication, authorization) = match &config.policy_file {
            Some(path) => {
                let document = std::fs::read_to_string(path)
                    .with_context(|| format!("reading policy {}", path.display()))?;
                let compiled =
                    DocumentPolicy::compile(&document).context("compiling policy document")?;
                let authentication = if compiled.has_authentication() {
                    Arc::new(compiled.clone()) as Arc<dyn PolicyEvaluator>
                } else {
                    native.clone()
                };
                (authentication, Arc::new(compiled) as Arc<dyn PolicyEvaluator>)
            }
            None => (native.clone(), native),
        };

        let users = Arc::new(match &config.users_file {
            Some(path) => InMemoryUserStore::from_file(path)?,
            None => InMemoryUserStore::new(),
        });

        let mut authority = TokenAuthority::new(keys.clone(), config.issuer.clone())
            .with_authentication_policy(authentication)
            .with_authorization_policy(authorization)
            .with_lookup_timeout(config.authority_timeout());
        if config.users_file.is_some() {
            let cached: Arc<dyn UserStore> =
                Arc::new(CachedUserStore::with_ttl(users.clone(), config.user_cache_ttl()));
            authority = authority.with_user_store(cached);
        }
        if !authority.has_user_store() {
            tracing::warn!("no users_file configured; verifying tokens locally only");
        }
        tracing::info!(issuer = authority.issuer(), users = users.len(), "token authority ready");
        let authority = Arc::new(authority);

        let client: Arc<dyn AuthorityClient> = match &config.authority_url {
            Some(url) => Arc::new(
                HttpAuthorityClient::new(url.clone(), config.authority_timeout())
                    .context("building authority client")?,
            ),
            None => Arc::new(LocalAuthority::new(authority.clone())),
        };

        Ok(Self {
            keys,
            authority,
            users,
            products: Arc::new(ProductStore::new()),
            homes: Arc::new(HomeStore::new()),
            gate: GateState::new(client, config.authority_timeout()),
        })
    }
}
