//! Configuration for the licensing subsystem.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `license.toml` file (or an explicit path)
//! 3. Default values (lowest priority)
//!
//! There are deliberately no defaults for the shared secret or the trusted
//! public key: both must be injected per environment.
//!
//! # Environment Variables
//!
//! - `POS_LICENSE_BASE_URL` - License server base URL
//! - `POS_LICENSE_PRODUCT_CODE` - Product code sent with every request
//! - `POS_LICENSE_HMAC_SECRET` - Shared secret for request signatures
//! - `POS_LICENSE_PUBLIC_KEY` - Ed25519 key that signs offline certificates
//! - `POS_LICENSE_TIMEOUT_SECS` - Request timeout in seconds
//! - `POS_LICENSE_TRIAL_DAYS` - Length of the automatic trial
//! - `POS_LICENSE_GRACE_DAYS` - Days a paid license stays usable after expiry
//! - `POS_LICENSE_CACHE_TTL_SECS` - How long a computed status is reused
//! - `POS_LICENSE_REFRESH_INTERVAL_SECS` - Background re-check cadence
//! - `POS_LICENSE_HEARTBEAT_INTERVAL_SECS` - Heartbeat cadence for paid keys
//! - `POS_LICENSE_STORAGE_PATH` - Location of the encrypted license record
//! - `POS_LICENSE_LOGGING_ENABLED` - Install the log subscriber
//! - `POS_LICENSE_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::{Config, ConfigBuilder};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::certificate::TrustedKey;
use crate::errors::{LicenseError, LicenseResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LicensingConfig {
    /// License server connection
    pub api: ApiConfig,
    /// Offline certificate verification
    pub certificate: CertificateConfig,
    /// Trial, grace and timer settings
    pub policy: PolicyConfig,
    /// Where the license record lives
    pub storage: StorageConfig,
    /// Details about the running application
    pub app: AppConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// License server connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub product_code: String,
    pub hmac_secret: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            product_code: "netviper-pos".to_string(),
            hmac_secret: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Offline certificate settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Ed25519 public key: PEM, hex, or base64.
    pub public_key: String,
}

/// License policy knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub trial_days: u32,
    pub grace_days: u32,
    pub cache_ttl_secs: u64,
    pub refresh_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trial_days: 30,
            grace_days: 7,
            cache_ttl_secs: 3600,
            refresh_interval_secs: 3600,
            heartbeat_interval_secs: 86_400,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit record path; defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// The record path to use.
    ///
    /// - Windows: `%APPDATA%\netviper-pos\license.enc`
    /// - macOS: `~/Library/Application Support/netviper-pos/license.enc`
    /// - Linux: `~/.local/share/netviper-pos/license.enc`
    ///
    /// Falls back to the working directory when no data directory exists.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join("netviper-pos"))
                .unwrap_or_default()
                .join("license.enc")
        })
    }
}

/// Application details reported to the license server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: String,
    /// Overrides the hostname as the device name shown in activation lists.
    pub device_name: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            device_name: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_int(name: &str) -> Option<i64> {
    env::var(name).ok().and_then(|v| v.trim().parse::<i64>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| v.trim().parse::<bool>().ok())
}

impl LicensingConfig {
    /// Load from `license.toml` in the working directory (optional) and the
    /// environment, then validate.
    pub fn load() -> LicenseResult<Self> {
        let builder = Self::defaults()?
            .add_source(config::File::with_name("license").required(false));
        Self::finish(builder)
    }

    /// Load from an explicit file (required) and the environment, then validate.
    pub fn load_from(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let builder = Self::defaults()?.add_source(config::File::from(path.as_ref()));
        Self::finish(builder)
    }

    fn defaults() -> LicenseResult<ConfigBuilder<DefaultState>> {
        let api = ApiConfig::default();
        let policy = PolicyConfig::default();
        let logging = LoggingConfig::default();

        Config::builder()
            .set_default("api.base_url", api.base_url)
            .and_then(|b| b.set_default("api.product_code", api.product_code))
            .and_then(|b| b.set_default("api.hmac_secret", api.hmac_secret))
            .and_then(|b| b.set_default("api.timeout_secs", api.timeout_secs as i64))
            .and_then(|b| b.set_default("certificate.public_key", ""))
            .and_then(|b| b.set_default("policy.trial_days", policy.trial_days as i64))
            .and_then(|b| b.set_default("policy.grace_days", policy.grace_days as i64))
            .and_then(|b| b.set_default("policy.cache_ttl_secs", policy.cache_ttl_secs as i64))
            .and_then(|b| {
                b.set_default(
                    "policy.refresh_interval_secs",
                    policy.refresh_interval_secs as i64,
                )
            })
            .and_then(|b| {
                b.set_default(
                    "policy.heartbeat_interval_secs",
                    policy.heartbeat_interval_secs as i64,
                )
            })
            .and_then(|b| b.set_default("app.version", AppConfig::default().version))
            .and_then(|b| b.set_default("logging.enabled", logging.enabled))
            .and_then(|b| b.set_default("logging.level", logging.level))
            .map_err(config_err)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> LicenseResult<Self> {
        let settings = builder
            .set_override_option("api.base_url", env_string("POS_LICENSE_BASE_URL"))
            .and_then(|b| {
                b.set_override_option("api.product_code", env_string("POS_LICENSE_PRODUCT_CODE"))
            })
            .and_then(|b| {
                b.set_override_option("api.hmac_secret", env_string("POS_LICENSE_HMAC_SECRET"))
            })
            .and_then(|b| {
                b.set_override_option("api.timeout_secs", env_int("POS_LICENSE_TIMEOUT_SECS"))
            })
            .and_then(|b| {
                b.set_override_option(
                    "certificate.public_key",
                    env_string("POS_LICENSE_PUBLIC_KEY"),
                )
            })
            .and_then(|b| {
                b.set_override_option("policy.trial_days", env_int("POS_LICENSE_TRIAL_DAYS"))
            })
            .and_then(|b| {
                b.set_override_option("policy.grace_days", env_int("POS_LICENSE_GRACE_DAYS"))
            })
            .and_then(|b| {
                b.set_override_option(
                    "policy.cache_ttl_secs",
                    env_int("POS_LICENSE_CACHE_TTL_SECS"),
                )
            })
            .and_then(|b| {
                b.set_override_option(
                    "policy.refresh_interval_secs",
                    env_int("POS_LICENSE_REFRESH_INTERVAL_SECS"),
                )
            })
            .and_then(|b| {
                b.set_override_option(
                    "policy.heartbeat_interval_secs",
                    env_int("POS_LICENSE_HEARTBEAT_INTERVAL_SECS"),
                )
            })
            .and_then(|b| {
                b.set_override_option("storage.path", env_string("POS_LICENSE_STORAGE_PATH"))
            })
            .and_then(|b| {
                b.set_override_option("logging.enabled", env_bool("POS_LICENSE_LOGGING_ENABLED"))
            })
            .and_then(|b| b.set_override_option("logging.level", env_string("POS_LICENSE_LOG_LEVEL")))
            .map_err(config_err)?
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(LicenseError::ConfigError(format!(
                "api.base_url must be an http(s) URL, got '{base_url}'"
            )));
        }
        if self.api.product_code.trim().is_empty() {
            return Err(LicenseError::ConfigError(
                "api.product_code cannot be empty".to_string(),
            ));
        }
        if self.api.hmac_secret.is_empty() {
            return Err(LicenseError::ConfigError(
                "api.hmac_secret is required".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(LicenseError::ConfigError(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.trusted_key()?;

        if self.policy.trial_days == 0 {
            return Err(LicenseError::ConfigError(
                "policy.trial_days must be greater than 0".to_string(),
            ));
        }
        if self.policy.cache_ttl_secs == 0
            || self.policy.refresh_interval_secs == 0
            || self.policy.heartbeat_interval_secs == 0
        {
            return Err(LicenseError::ConfigError(
                "policy cache and timer intervals must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// The parsed certificate signing key.
    pub fn trusted_key(&self) -> LicenseResult<TrustedKey> {
        TrustedKey::parse(&self.certificate.public_key).map_err(|e| match e {
            LicenseError::ConfigError(msg) => {
                LicenseError::ConfigError(format!("certificate.public_key: {msg}"))
            }
            other => other,
        })
    }
}
