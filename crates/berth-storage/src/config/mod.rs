//! Storage subsystem configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, and `BERTH_*` environment variables.
//!
//! ```toml
//! feature_enabled = true
//!
//! [txn]
//! max_attempts = 5
//!
//! [environ]
//! env_type = "ec2"
//! default_block_pool = "fast"
//!
//! [[pools]]
//! name = "fast"
//! provider = "ebs"
//! ```

pub mod error;

use std::path::Path;

use berth_constants::txn::MAX_TXN_ATTEMPTS;
use berth_txn::TxnConfig;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

pub use self::error::ConfigError;
use crate::pools::Pool;
use crate::pools::PoolCatalog;

const ENV_FEATURE: &str = "BERTH_STORAGE_FEATURE";
const ENV_TXN_MAX_ATTEMPTS: &str = "BERTH_TXN_MAX_ATTEMPTS";
const ENV_TYPE: &str = "BERTH_ENV_TYPE";
const ENV_DEFAULT_BLOCK_POOL: &str = "BERTH_DEFAULT_BLOCK_POOL";
const ENV_DEFAULT_FILESYSTEM_POOL: &str = "BERTH_DEFAULT_FILESYSTEM_POOL";

mod defaults {
    pub fn feature_enabled() -> bool {
        true
    }

    pub fn env_type() -> String {
        "dummy".to_string()
    }
}

/// Environment settings the constraint resolver consults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironConfig {
    /// Environment (cloud) type, used to decide which providers are allowed.
    #[serde(default = "defaults::env_type")]
    pub env_type: String,
    /// Pool for block storage when none is given; the loop provider otherwise.
    #[serde(default)]
    pub default_block_pool: Option<String>,
    /// Pool for filesystem storage when none is given.
    #[serde(default)]
    pub default_filesystem_pool: Option<String>,
}

impl Default for EnvironConfig {
    fn default() -> Self {
        Self {
            env_type: defaults::env_type(),
            default_block_pool: None,
            default_filesystem_pool: None,
        }
    }
}

/// Top-level storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// When false, constraint defaulting and validation are skipped.
    #[serde(default = "defaults::feature_enabled")]
    pub feature_enabled: bool,
    #[serde(default)]
    pub txn: TxnConfig,
    #[serde(default)]
    pub environ: EnvironConfig,
    #[serde(default)]
    pub pools: Vec<Pool>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            feature_enabled: defaults::feature_enabled(),
            txn: TxnConfig::default(),
            environ: EnvironConfig::default(),
            pools: Vec::new(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from defaults and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        info!(feature_enabled = config.feature_enabled, env_type = %config.environ.env_type, "loaded storage configuration");
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_toml_file(path.as_ref())?;
        config.apply_env_overrides()?;
        config.validate()?;
        info!(
            path = %path.as_ref().display(),
            feature_enabled = config.feature_enabled,
            env_type = %config.environ.env_type,
            "loaded storage configuration"
        );
        Ok(config)
    }

    /// Parse a TOML file without applying overrides.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::File { reason, .. } => ConfigError::File {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::File {
            path: "<string>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply environment variable overrides to existing configuration.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup(ENV_FEATURE) {
            self.feature_enabled = parse_bool(ENV_FEATURE, &val)?;
        }
        if let Some(val) = lookup(ENV_TXN_MAX_ATTEMPTS) {
            self.txn.max_attempts = val.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TXN_MAX_ATTEMPTS.to_string(),
                value: val.clone(),
                reason: "must be an integer".to_string(),
            })?;
        }
        if let Some(val) = lookup(ENV_TYPE) {
            self.environ.env_type = val;
        }
        if let Some(val) = lookup(ENV_DEFAULT_BLOCK_POOL) {
            self.environ.default_block_pool = non_empty(val);
        }
        if let Some(val) = lookup(ENV_DEFAULT_FILESYSTEM_POOL) {
            self.environ.default_filesystem_pool = non_empty(val);
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let attempts = self.txn.max_attempts;
        if attempts == 0 || attempts > MAX_TXN_ATTEMPTS {
            return Err(ConfigError::InvalidValue {
                key: "txn.max_attempts".to_string(),
                value: attempts.to_string(),
                reason: format!("must be between 1 and {MAX_TXN_ATTEMPTS}"),
            });
        }
        if self.txn.initial_backoff_ms > self.txn.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                key: "txn.initial_backoff_ms".to_string(),
                value: self.txn.initial_backoff_ms.to_string(),
                reason: "must not exceed txn.max_backoff_ms".to_string(),
            });
        }
        if self.environ.env_type.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "environ.env_type".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Pools declared in the configuration.
    pub fn pool_catalog(&self) -> Result<PoolCatalog, ConfigError> {
        self.pools.iter().cloned().try_fold(PoolCatalog::new(), |catalog, pool| {
            let name = pool.name.clone();
            catalog.with_pool(pool).map_err(|e| ConfigError::InvalidValue {
                key: "pools".to_string(),
                value: name,
                reason: e.to_string(),
            })
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
