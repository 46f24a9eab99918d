// src/config.rs
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::jobs::GenerationTimings;
use crate::models::file::Principal;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_PLACEHOLDER_ASSET: &str = "assets/placeholders/minimal-placeholder.mp4";
pub const DEFAULT_ASSETS_DIR: &str = "assets";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of milliseconds, got {value:?}")]
    InvalidDuration { key: &'static str, value: String },
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Remote File Store; `None` runs the in-memory store.
    pub file_store_url: Option<String>,
    /// URL or path of the placeholder video.
    pub placeholder_asset: String,
    pub assets_dir: String,
    /// Who the dashboard acts as; `None` means signed out.
    pub principal: Option<Principal>,
    pub timings: GenerationTimings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let required_or = |key: &'static str, default: &str| -> Result<String, ConfigError> {
            match lookup(key) {
                None => Ok(default.to_string()),
                Some(v) if v.trim().is_empty() => Err(ConfigError::Empty { key }),
                Some(v) => Ok(v.trim().to_string()),
            }
        };

        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match optional(key) {
                None => Ok(default),
                Some(value) => value
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidDuration { key, value }),
            }
        };

        let defaults = GenerationTimings::default();
        let timings = GenerationTimings {
            processing: millis("PROCESSING_DELAY_MS", defaults.processing)?,
            completion_reset: millis("COMPLETION_RESET_MS", defaults.completion_reset)?,
            gallery_retry: millis("GALLERY_RETRY_DELAY_MS", defaults.gallery_retry)?,
            gallery_refetch: millis("GALLERY_REFETCH_MS", defaults.gallery_refetch)?,
        };

        Ok(Self {
            bind_addr: required_or("BIND_ADDR", DEFAULT_BIND_ADDR)?,
            file_store_url: optional("FILE_STORE_URL"),
            placeholder_asset: required_or("PLACEHOLDER_ASSET", DEFAULT_PLACEHOLDER_ASSET)?,
            assets_dir: required_or("ASSETS_DIR", DEFAULT_ASSETS_DIR)?,
            principal: optional("DASHBOARD_PRINCIPAL").map(Principal::new),
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(cfg.file_store_url, None);
        assert_eq!(cfg.placeholder_asset, DEFAULT_PLACEHOLDER_ASSET);
        assert_eq!(cfg.principal, None);
        assert_eq!(cfg.timings, GenerationTimings::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("FILE_STORE_URL", "http://store:8080"),
            ("DASHBOARD_PRINCIPAL", "alice-principal"),
            ("PROCESSING_DELAY_MS", "10"),
            ("GALLERY_REFETCH_MS", " 250 "),
        ])
        .unwrap();
        assert_eq!(cfg.file_store_url.as_deref(), Some("http://store:8080"));
        assert_eq!(cfg.principal, Some(Principal::new("alice-principal")));
        assert_eq!(cfg.timings.processing, Duration::from_millis(10));
        assert_eq!(cfg.timings.gallery_refetch, Duration::from_millis(250));
        assert_eq!(cfg.timings.completion_reset, Duration::from_secs(2));
    }

    #[test]
    fn test_malformed_values() {
        assert_eq!(
            config(&[("COMPLETION_RESET_MS", "soon")]).unwrap_err(),
            ConfigError::InvalidDuration {
                key: "COMPLETION_RESET_MS",
                value: "soon".to_string()
            }
        );
        assert_eq!(
            config(&[("BIND_ADDR", "  ")]).unwrap_err(),
            ConfigError::Empty { key: "BIND_ADDR" }
        );
    }
}
