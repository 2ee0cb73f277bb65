//! Configuration for the registration service.
//!
//! Values come from environment variables using `__` as the section separator
//! (`STORAGE__CLOUD_NAME`, `SERVER__PORT`). A `.env` file is loaded first if
//! present. The flat variables `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`,
//! `CLOUDINARY_API_SECRET`, `NODE_ENV` and `PORT` are honored as fallbacks.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote object storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local staging of uploaded files
    #[serde(default)]
    pub upload: UploadConfig,

    /// Registration records storage
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub registration: RegistrationConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment; `production` hides server error details
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Which object storage implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Cloudinary,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_storage_api_url")]
    pub api_url: String,

    pub cloud_name: Option<String>,

    pub api_key: Option<String>,

    pub api_secret: Option<SecretString>,

    /// Remote folder for uploaded proofs of payment
    #[serde(default = "default_folder")]
    pub folder: String,

    #[serde(default = "default_storage_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Base URL for the in-memory backend
    #[serde(default = "default_memory_base_url")]
    pub memory_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory for staged uploads
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Path to the registrations file
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Enable persistence (if false, records are in-memory only)
    #[serde(default = "default_true")]
    pub persist: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationConfig {
    /// Omit access tokens from list results
    #[serde(default)]
    pub redact_list_tokens: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute on `/api` routes; 0 disables limiting
    #[serde(default)]
    pub global_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_max_age", with = "humantime_serde")]
    pub max_age: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            environment: default_environment(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            api_url: default_storage_api_url(),
            cloud_name: None,
            api_key: None,
            api_secret: None,
            folder: default_folder(),
            timeout: default_storage_timeout(),
            memory_base_url: default_memory_base_url(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            persist: true,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            max_age: default_cors_max_age(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3002
}

fn default_environment() -> String {
    "development".into()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_storage_api_url() -> String {
    "https://api.cloudinary.com".into()
}

fn default_folder() -> String {
    crate::service::DEFAULT_UPLOAD_FOLDER.into()
}

fn default_storage_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_memory_base_url() -> String {
    "memory://objects".into()
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("/data/registrations.json")
}

fn default_true() -> bool {
    true
}

fn default_cors_max_age() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_log_level() -> String {
    "info".into()
}

/// Flat variables mapped onto their structured keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("CLOUDINARY_CLOUD_NAME", "storage.cloud_name"),
    ("CLOUDINARY_API_KEY", "storage.api_key"),
    ("CLOUDINARY_API_SECRET", "storage.api_secret"),
    ("NODE_ENV", "server.environment"),
    ("PORT", "server.port"),
];

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_env(std::env::vars())
    }

    /// Build configuration from an explicit set of variables.
    pub fn from_env(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: config::Map<String, String> = vars.into_iter().collect();

        let mut builder = config::Config::builder();
        for (var, key) in LEGACY_ENV {
            if let Some(value) = vars.get(*var) {
                builder = builder
                    .set_default(*key, value.as_str())
                    .with_context(|| format!("Invalid value for {var}"))?;
            }
        }

        let config = builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false)
                    .source(Some(vars)),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::Cloudinary {
            let missing: Vec<&str> = [
                ("cloud_name", self.storage.cloud_name.is_none()),
                ("api_key", self.storage.api_key.is_none()),
                ("api_secret", self.storage.api_secret.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect();

            if !missing.is_empty() {
                bail!(
                    "Cloudinary storage requires storage.{}",
                    missing.join(", storage.")
                );
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_with_memory_backend() {
        let config = Config::from_env(vars(&[("STORAGE__BACKEND", "memory")])).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.server.port, 3002);
        assert_eq!(config.server.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.folder, "3SignetPaymentUploads");
        assert_eq!(config.storage.timeout, Duration::from_secs(60));
        assert_eq!(config.cors.max_age, Duration::from_secs(86400));
        assert_eq!(config.rate_limit.global_per_minute, 0);
        assert!(config.registry.persist);
        assert!(!config.registration.redact_list_tokens);
        assert!(!config.is_production());
    }

    #[test]
    fn test_cloudinary_requires_credentials() {
        let err = Config::from_env(vars(&[("STORAGE__CLOUD_NAME", "demo")])).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("storage.api_key"));
        assert!(message.contains("storage.api_secret"));
    }

    #[test]
    fn test_legacy_variables() {
        let config = Config::from_env(vars(&[
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "shh"),
            ("NODE_ENV", "production"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.storage.cloud_name.as_deref(), Some("demo"));
        assert_eq!(
            config.storage.api_secret.as_ref().unwrap().expose_secret(),
            "shh"
        );
        assert_eq!(config.server.port, 8080);
        assert!(config.is_production());
    }

    #[test]
    fn test_structured_variables_override_legacy() {
        let config = Config::from_env(vars(&[
            ("STORAGE__BACKEND", "memory"),
            ("PORT", "8080"),
            ("SERVER__PORT", "9000"),
            ("STORAGE__TIMEOUT", "5s"),
            ("REGISTRATION__REDACT_LIST_TOKENS", "true"),
            ("RATE_LIMIT__GLOBAL_PER_MINUTE", "120"),
        ]))
        .unwrap();

        assert_eq!(config.rate_limit.global_per_minute, 120);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.timeout, Duration::from_secs(5));
        assert!(config.registration.redact_list_tokens);
    }
}
