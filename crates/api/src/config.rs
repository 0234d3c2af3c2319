//! Process configuration.
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. `Config::default()`
//! 2. `tollgate.toml`, or the file named by `TOLLGATE_CONFIG`, if it exists
//! 3. `TOLLGATE_*` environment variables (e.g. `TOLLGATE_LISTEN_ADDR`)
//!
//! `TOLLGATE_KEYS_JSON` is taken verbatim: the env provider would otherwise
//! parse the document into a dictionary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tollgate_observability::LogFormat;

pub const DEFAULT_CONFIG_FILE: &str = "tollgate.toml";
pub const CONFIG_PATH_ENV: &str = "TOLLGATE_CONFIG";
pub const ENV_PREFIX: &str = "TOLLGATE_";
pub const KEYS_JSON_ENV: &str = "TOLLGATE_KEYS_JSON";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("loading configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// Expected `iss` of every token, and the issuer stamped on new ones.
    pub issuer: String,
    /// Directory of `<kid>.pem` private keys, each with an optional
    /// `<kid>.pub.pem`.
    pub keys_dir: PathBuf,
    /// `{"key": <kid>, "pem": <private pem>}` document, usually injected as a
    /// secret. When set, a missing `keys_dir` is not an error.
    pub keys_json: Option<String>,
    /// Kid new tokens are signed with when the request names none.
    pub active_kid: Option<String>,
    /// JSON user seed. Without it the authority verifies tokens locally and
    /// cannot exchange Basic credentials.
    pub users_file: Option<PathBuf>,
    /// JSON policy document. Without it the built-in rule table is used.
    pub policy_file: Option<PathBuf>,
    /// Base URL of a remote authority for the gated routes. Without it the
    /// gated routes call the in-process authority.
    pub authority_url: Option<String>,
    pub authority_timeout_secs: u64,
    pub user_cache_ttl_secs: u64,
    /// Slack allowed on `exp`/`nbf` by the built-in signature check.
    pub clock_leeway_secs: u64,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            issuer: "service project".to_string(),
            keys_dir: PathBuf::from("keys"),
            keys_json: None,
            active_kid: None,
            users_file: None,
            policy_file: None,
            authority_url: None,
            authority_timeout_secs: 5,
            user_cache_ttl_secs: 600,
            clock_leeway_secs: 0,
            log_format: LogFormat::Json,
        }
    }
}

impl Config {
    /// Load from defaults, the config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut figment = Self::figment(&path);
        if let Ok(document) = std::env::var(KEYS_JSON_ENV) {
            figment = figment.merge(Serialized::default("keys_json", document));
        }
        Self::from_figment(figment)
    }

    /// Layered sources with `path` as the config file.
    pub fn figment(path: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config", "keys_json"]))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("issuer must not be empty".into()));
        }
        if self.authority_timeout_secs == 0 {
            return Err(ConfigError::Invalid("authority_timeout_secs must be positive".into()));
        }
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("listen_addr must not be empty".into()));
        }
        if self.keys_json.as_deref().is_some_and(|doc| doc.trim().is_empty()) {
            return Err(ConfigError::Invalid("keys_json must not be empty when set".into()));
        }
        Ok(())
    }

    pub fn authority_timeout(&self) -> Duration {
        Duration::from_secs(self.authority_timeout_secs)
    }

    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl_secs)
    }
}
