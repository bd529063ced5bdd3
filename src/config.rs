//! Process configuration.
//!
//! Built once at startup and shared read-only (`Arc<Config>`) with every
//! component that needs it. Nothing reads environment variables after
//! [`Config::load`] returns.
//!
//! Resolution order:
//! 1. explicit `--config <path>`
//! 2. `$UPWATCH_CONFIG`
//! 3. `config.toml` in the platform config dir, if it exists
//! 4. the built-in preset named by `$UPWATCH_ENV` (`staging` or `production`)
//!
//! `$UPWATCH_HASHING_SECRET` overrides `auth.hashing_secret` in every case.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "UPWATCH_CONFIG";
pub const ENVIRONMENT_ENV: &str = "UPWATCH_ENV";
pub const HASHING_SECRET_ENV: &str = "UPWATCH_HASHING_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Name of the environment preset this config derives from.
    #[serde(default = "default_env_name")]
    pub env_name: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Whole-request deadline; exceeded requests get 408.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Which rule [`crate::auth::verify_token`] applies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenPolicy {
    /// Token must belong to the phone and be unexpired.
    #[default]
    Strict,
    /// Token is rejected only when it belongs to another phone AND has
    /// expired. An unexpired token for any phone is accepted.
    Legacy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC key for password hashes. Changing it invalidates every stored hash.
    #[serde(default = "default_hashing_secret")]
    pub hashing_secret: String,
    /// Lifetime of a freshly issued token.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Lifetime granted by `PUT /tokens {extend: true}`, counted from now.
    #[serde(default = "default_token_extend_secs")]
    pub token_extend_secs: u64,
    #[serde(default)]
    pub token_policy: TokenPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecksConfig {
    /// Per-user cap on the number of checks.
    #[serde(default = "default_max_checks")]
    pub max_checks: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Per-call store deadline in milliseconds. `None` waits indefinitely.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: Option<u64>,
}

fn default_env_name() -> String {
    "staging".into()
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}
fn default_max_body_bytes() -> usize {
    65_536
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_hashing_secret() -> String {
    "somethingSuperSecret".into()
}
fn default_token_ttl_secs() -> u64 {
    3600
}
fn default_token_extend_secs() -> u64 {
    36_000
}
fn default_max_checks() -> usize {
    5
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".data")
}
fn default_op_timeout_ms() -> Option<u64> {
    Some(5_000)
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hashing_secret: default_hashing_secret(),
            token_ttl_secs: default_token_ttl_secs(),
            token_extend_secs: default_token_extend_secs(),
            token_policy: TokenPolicy::default(),
        }
    }
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            max_checks: default_max_checks(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::staging()
    }
}

impl Config {
    /// Staging preset: port 3000.
    pub fn staging() -> Self {
        Self {
            env_name: "staging".into(),
            gateway: GatewayConfig::default(),
            auth: AuthConfig::default(),
            checks: ChecksConfig::default(),
            store: StoreConfig::default(),
        }
    }

    /// Production preset: port 5000, separate hashing secret.
    pub fn production() -> Self {
        Self {
            env_name: "production".into(),
            gateway: GatewayConfig {
                port: 5000,
                ..GatewayConfig::default()
            },
            auth: AuthConfig {
                hashing_secret: "somethingSuperSecretAgain".into(),
                ..AuthConfig::default()
            },
            checks: ChecksConfig::default(),
            store: StoreConfig::default(),
        }
    }

    /// Preset by name, case-insensitive. Unknown names fall back to staging.
    pub fn preset(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" => Self::production(),
            "staging" | "" => Self::staging(),
            other => {
                tracing::warn!("Unknown environment '{other}', using staging");
                Self::staging()
            }
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse config TOML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Default config file location for this platform, if one can be resolved.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "upwatch", "upwatch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Resolve, apply environment overrides, and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = explicit
            .map(Path::to_path_buf)
            .or(env_path)
            .or_else(|| Self::default_path().filter(|p| p.is_file()));

        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                let env_name = std::env::var(ENVIRONMENT_ENV).unwrap_or_default();
                Self::preset(&env_name)
            }
        };

        if let Ok(secret) = std::env::var(HASHING_SECRET_ENV) {
            let secret = secret.trim();
            if !secret.is_empty() {
                config.auth.hashing_secret = secret.to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.hashing_secret.trim().is_empty() {
            bail!("auth.hashing_secret must not be empty");
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_extend_secs == 0 {
            bail!("auth.token_ttl_secs and auth.token_extend_secs must be positive");
        }
        if self.checks.max_checks == 0 {
            bail!("checks.max_checks must be at least 1");
        }
        if self.gateway.max_body_bytes == 0 {
            bail!("gateway.max_body_bytes must be positive");
        }
        if self.store.op_timeout_ms == Some(0) {
            bail!("store.op_timeout_ms must be positive when set");
        }
        Ok(())
    }

    /// TOML rendering with the hashing secret masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut copy = self.clone();
        copy.auth.hashing_secret = "***".into();
        toml::to_string_pretty(&copy).context("Failed to serialize config")
    }
}
