use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::currency::DEFAULT_EXCLUDED_CURRENCIES;
use crate::providers::circuit_breaker::CircuitBreakerConfig;
use crate::providers::retry::RetryPolicy;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://api.frankfurter.app".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry_count: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_jitter_ms: u64,
    pub failure_threshold: u32,
    pub break_duration_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        ResilienceConfig {
            retry_count: 3,
            retry_base_delay_ms: 1000,
            retry_max_jitter_ms: 100,
            failure_threshold: 5,
            break_duration_secs: 30,
        }
    }
}

impl ResilienceConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_count,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_jitter_ms),
        )
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            break_duration: Duration::from_secs(self.break_duration_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    pub latest_ttl_secs: u64,
    pub historical_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            default_ttl_secs: 5 * 60,
            latest_ttl_secs: 15 * 60,
            historical_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn latest_ttl(&self) -> Duration {
        Duration::from_secs(self.latest_ttl_secs)
    }

    pub fn historical_ttl(&self) -> Duration {
        Duration::from_secs(self.historical_ttl_secs)
    }
}

fn default_excluded_currencies() -> Vec<String> {
    DEFAULT_EXCLUDED_CURRENCIES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_excluded_currencies")]
    pub excluded_currencies: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            resilience: ResilienceConfig::default(),
            cache: CacheConfig::default(),
            excluded_currencies: default_excluded_currencies(),
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults
    /// when it does not exist.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "xrate", "xrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_yaml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document, so treat it as all defaults
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.provider.base_url, "https://api.frankfurter.app");
        assert_eq!(config.resilience.retry_count, 3);
        assert_eq!(config.resilience.failure_threshold, 5);
        assert_eq!(config.resilience.break_duration_secs, 30);
        assert_eq!(config.cache.latest_ttl(), Duration::from_secs(900));
        assert_eq!(config.cache.historical_ttl(), Duration::from_secs(86400));
        assert_eq!(config.excluded_currencies, vec!["TRY", "PLN", "THB", "MXN"]);
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/fx"
resilience:
  retry_count: 1
  break_duration_secs: 5
cache:
  latest_ttl_secs: 60
excluded_currencies:
  - rub
"#;

        let config = AppConfig::from_yaml(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/fx");
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.resilience.retry_count, 1);
        assert_eq!(config.resilience.failure_threshold, 5);
        assert_eq!(
            config.resilience.circuit_breaker().break_duration,
            Duration::from_secs(5)
        );
        assert_eq!(config.resilience.retry_policy().max_retries(), 1);
        assert_eq!(config.cache.latest_ttl_secs, 60);
        assert_eq!(config.cache.historical_ttl_secs, 86400);
        assert_eq!(config.excluded_currencies, vec!["rub"]);
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = AppConfig::default().to_yaml().unwrap();
        assert_eq!(AppConfig::from_yaml(&yaml).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_from_path(dir.path().join("missing.yaml"));
        assert!(result.is_err());
    }
}
