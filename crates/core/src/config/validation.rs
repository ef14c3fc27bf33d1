//! Configuration validation rules.
//!
//! Checks `AppConfig` values after they have been loaded from environment,
//! files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn is_name_part(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL with a host
    /// - `cache_prefix` or `cache_version` is empty or contains whitespace
    /// - `api_prefix` or a manifest entry does not start with `/`
    /// - the manifest lists the same path twice
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if !is_name_part(&self.cache_prefix) {
            return Err(invalid("cache_prefix", "must be non-empty without whitespace"));
        }
        if !is_name_part(&self.cache_version) {
            return Err(invalid("cache_version", "must be non-empty without whitespace"));
        }

        if !self.api_prefix.starts_with('/') {
            return Err(invalid("api_prefix", "must start with '/'"));
        }

        let mut seen = HashSet::new();
        for path in &self.static_manifest {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: "static_manifest".into(),
                    reason: format!("entry {path:?} must start with '/'"),
                });
            }
            if !seen.insert(path.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "static_manifest".into(),
                    reason: format!("duplicate entry {path:?}"),
                });
            }
        }
        if self.static_manifest.is_empty() {
            tracing::warn!("static_manifest is empty; install will pre-cache nothing");
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 100MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.dynamic_max_age_secs == Some(0) {
            return Err(invalid("dynamic_max_age_secs", "must be greater than 0 when set"));
        }

        Ok(())
    }
}
