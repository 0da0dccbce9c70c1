use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::DEFAULT_MAX_BODY_BYTES;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter fraction in [0, 1] (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts(),
            initial_delay_ms: policy.initial_delay().as_millis() as u64,
            max_delay_ms: policy.max_delay().as_millis() as u64,
            jitter: policy.jitter(),
        }
    }
}

impl RetrySettings {
    /// Validated policy; fails on out-of-range values.
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.jitter,
        )
        .context("invalid [retry] settings")
    }
}

/// Guarded fetch parameters (optional `[fetch]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_ms: u64,
    pub max_body_bytes: usize,
    /// Overrides the built-in `backstop/<version>` user agent.
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: None,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Global configuration loaded from `~/.config/backstop/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackstopConfig {
    /// Model label used for requests (shown in quota messages).
    #[serde(default)]
    pub model: Option<String>,
    /// Model label to downgrade to on persistent rate limits.
    #[serde(default)]
    pub fallback_model: Option<String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetrySettings>,
    /// Optional fetch settings; if missing, built-in defaults are used.
    #[serde(default)]
    pub fetch: Option<FetchSettings>,
}

impl BackstopConfig {
    pub fn retry_settings(&self) -> RetrySettings {
        self.retry.clone().unwrap_or_default()
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        self.fetch.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("backstop")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BackstopConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<BackstopConfig> {
    if !path.exists() {
        let default_cfg = BackstopConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("failed to write default config {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from(path)
}

pub fn load_from(path: &Path) -> Result<BackstopConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: BackstopConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = BackstopConfig::default();
        assert!(cfg.retry.is_none());
        assert!(cfg.fetch.is_none());
        let retry = cfg.retry_settings();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay_ms, 5_000);
        assert_eq!(retry.max_delay_ms, 30_000);
        assert_eq!(cfg.fetch_settings().timeout(), Duration::from_secs(10));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = BackstopConfig {
            model: Some("gemini-2.5-pro".into()),
            fallback_model: Some("gemini-2.5-flash".into()),
            retry: Some(RetrySettings::default()),
            fetch: Some(FetchSettings::default()),
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: BackstopConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_sections() {
        let toml = r#"
            fallback_model = "flash"

            [retry]
            max_attempts = 3
            initial_delay_ms = 100

            [fetch]
            timeout_ms = 2500
        "#;
        let cfg: BackstopConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.fallback_model.as_deref(), Some("flash"));
        let retry = cfg.retry_settings();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay_ms, 100);
        assert_eq!(retry.max_delay_ms, 30_000);
        let policy = retry.to_policy().unwrap();
        assert_eq!(policy.initial_delay(), Duration::from_millis(100));
        let fetch = cfg.fetch_settings();
        assert_eq!(fetch.timeout(), Duration::from_millis(2500));
        assert_eq!(fetch.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn invalid_retry_settings_rejected() {
        let settings = RetrySettings {
            max_attempts: 0,
            ..RetrySettings::default()
        };
        assert!(settings.to_policy().is_err());

        let settings = RetrySettings {
            initial_delay_ms: 5_000,
            max_delay_ms: 10,
            ..RetrySettings::default()
        };
        assert!(settings.to_policy().is_err());
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg, BackstopConfig::default());
        assert!(path.exists());
        assert_eq!(load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn load_from_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "retry = [").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }
}
