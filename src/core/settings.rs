use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::controller::Timing;

const APP_DIR: &str = "sentiment-refresh";
const STATE_FILE: &str = "news-update-state.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub storage: StorageSettings,
    pub notifications: NotificationSettings,
    pub news: NewsSettings,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub countdown_interval_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 120,
            countdown_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub symbol: Option<String>,
    pub page_size: u32,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            symbol: None,
            page_size: 9,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;

        if self.api.request_timeout_secs == 0 {
            anyhow::bail!("api.request_timeout_secs must be greater than 0");
        }
        if self.polling.interval_secs == 0 {
            anyhow::bail!("polling.interval_secs must be greater than 0");
        }
        if self.polling.countdown_interval_secs == 0 {
            anyhow::bail!("polling.countdown_interval_secs must be greater than 0");
        }
        if self.polling.timeout_secs < self.polling.interval_secs {
            anyhow::bail!(
                "polling.timeout_secs ({}) must not be shorter than polling.interval_secs ({})",
                self.polling.timeout_secs,
                self.polling.interval_secs
            );
        }
        if self.news.page_size == 0 {
            anyhow::bail!("news.page_size must be greater than 0");
        }
        Ok(())
    }

    pub fn state_path(&self) -> Option<PathBuf> {
        self.storage.state_path.clone().or_else(|| {
            dirs::data_local_dir().map(|p| p.join(APP_DIR).join(STATE_FILE))
        })
    }

    pub fn timing(&self) -> Timing {
        Timing {
            poll_interval: Duration::from_secs(self.polling.interval_secs),
            poll_timeout: Duration::from_secs(self.polling.timeout_secs),
            countdown_interval: Duration::from_secs(self.polling.countdown_interval_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "http://localhost:8080");
        assert_eq!(settings.polling.interval_secs, 5);
        assert_eq!(settings.polling.timeout_secs, 120);
        assert_eq!(settings.polling.countdown_interval_secs, 60);
        assert!(settings.notifications.enabled);
        assert_eq!(settings.news.page_size, 9);
        assert!(!settings.debug);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();

        settings.polling.interval_secs = 0;
        assert!(settings.validate().is_err());

        settings.polling.interval_secs = 30;
        settings.polling.timeout_secs = 10;
        assert!(settings.validate().is_err());

        settings.polling.timeout_secs = 120;
        assert!(settings.validate().is_ok());

        settings.api.base_url = "not a url".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            debug = true

            [api]
            base_url = "https://dashboard.example.com"

            [polling]
            interval_secs = 2
            timeout_secs = 60

            [storage]
            state_path = "/tmp/news-state.json"

            [notifications]
            enabled = false

            [news]
            symbol = "ETH"
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.api.base_url, "https://dashboard.example.com");
        assert_eq!(settings.api.request_timeout_secs, 10);
        assert_eq!(settings.polling.interval_secs, 2);
        assert_eq!(settings.polling.timeout_secs, 60);
        assert_eq!(settings.polling.countdown_interval_secs, 60);
        assert_eq!(
            settings.state_path(),
            Some(PathBuf::from("/tmp/news-state.json"))
        );
        assert!(!settings.notifications.enabled);
        assert_eq!(settings.news.symbol.as_deref(), Some("ETH"));

        let timing = settings.timing();
        assert_eq!(timing.poll_interval, Duration::from_secs(2));
        assert_eq!(timing.poll_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.polling.timeout_secs, 120);
    }
}
