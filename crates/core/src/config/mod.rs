//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MBM_SW_*)
//! 2. TOML config file (if MBM_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod layout;
mod validation;

pub use layout::CacheLayout;
pub use validation::ConfigError;

/// Application shell served from the static partition.
pub const DEFAULT_STATIC_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/static/js/bundle.js",
    "/static/css/main.css",
    "/manifest.json",
    "/favicon.ico",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MBM_SW_*)
/// 2. TOML config file (if MBM_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the application. Only same-origin requests are intercepted.
    ///
    /// Set via MBM_SW_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by every partition name this worker owns.
    ///
    /// Set via MBM_SW_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Generation identifier of the current deployment (e.g. "v1").
    ///
    /// Set via MBM_SW_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path prefix that marks API requests.
    ///
    /// Set via MBM_SW_API_PREFIX environment variable.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Paths pre-cached at install time, in order.
    #[serde(default = "default_static_manifest")]
    pub static_manifest: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via MBM_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via MBM_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via MBM_SW_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via MBM_SW_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Qualify the dynamic partition with the generation identifier, so
    /// activation prunes dynamic entries from older deployments too.
    ///
    /// Set via MBM_SW_VERSION_DYNAMIC environment variable.
    #[serde(default)]
    pub version_dynamic: bool,

    /// Maximum age of dynamic entries in seconds. Unset means no expiry.
    ///
    /// Set via MBM_SW_DYNAMIC_MAX_AGE_SECS environment variable.
    #[serde(default)]
    pub dynamic_max_age_secs: Option<u64>,
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "mbm-connect".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_static_manifest() -> Vec<String> {
    DEFAULT_STATIC_MANIFEST.iter().map(|p| p.to_string()).collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mbm-sw-cache.sqlite")
}

fn default_user_agent() -> String {
    "mbm-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            api_prefix: default_api_prefix(),
            static_manifest: default_static_manifest(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            version_dynamic: false,
            dynamic_max_age_secs: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an http(s) URL with a host.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL with a host".into() });
        }
        Ok(url)
    }

    /// Partition names and retention policy derived from this configuration.
    pub fn layout(&self) -> CacheLayout {
        CacheLayout::new(&self.cache_prefix, &self.cache_version, self.version_dynamic)
            .with_dynamic_max_age(self.dynamic_max_age_secs.map(Duration::from_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MBM_SW_`
    /// 2. TOML file from `MBM_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MBM_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MBM_SW_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.cache_prefix, "mbm-connect");
        assert_eq!(config.cache_version, "v1");
        assert_eq!(config.api_prefix, "/api/");
        assert_eq!(config.static_manifest.len(), DEFAULT_STATIC_MANIFEST.len());
        assert_eq!(config.db_path, PathBuf::from("./mbm-sw-cache.sqlite"));
        assert_eq!(config.user_agent, "mbm-sw/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert!(!config.version_dynamic);
        assert!(config.dynamic_max_age_secs.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_layout_from_config() {
        let config = AppConfig { cache_version: "v7".into(), dynamic_max_age_secs: Some(60), ..Default::default() };
        let layout = config.layout();
        assert_eq!(layout.static_partition, "mbm-connect-static-v7");
        assert_eq!(layout.dynamic_partition, "mbm-connect-dynamic");
        assert_eq!(layout.dynamic_max_age, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_origin_url_rejects_non_http() {
        let config = AppConfig { origin: "file:///srv/app".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_load_from_env_and_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "sw.toml",
                r#"
                cache_version = "v3"
                static_manifest = ["/", "/index.html"]
                "#,
            )?;
            jail.set_env("MBM_SW_CONFIG_FILE", "sw.toml");
            jail.set_env("MBM_SW_ORIGIN", "https://mbm.example");
            jail.set_env("MBM_SW_VERSION_DYNAMIC", "true");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.origin, "https://mbm.example");
            assert_eq!(config.cache_version, "v3");
            assert_eq!(config.static_manifest, vec!["/".to_string(), "/index.html".to_string()]);
            assert!(config.version_dynamic);
            Ok(())
        });
    }
}
