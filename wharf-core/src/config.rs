use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alert::AlertConfig;
use crate::series::CHART_WINDOW;
use crate::state::LOG_CAPACITY;

/// Color scheme choice, persisted across runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeChoice {
    #[default]
    Dark,
    HighContrast,
}

impl ThemeChoice {
    pub fn cycle(self) -> Self {
        match self {
            Self::Dark => Self::HighContrast,
            Self::HighContrast => Self::Dark,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::HighContrast => "high-contrast",
        }
    }
}

/// Root configuration file structure (`wharf.yml`). Every field has a
/// default, so a missing file runs the dashboard unchanged.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WharfConfig {
    #[serde(default)]
    pub theme: ThemeChoice,

    /// Points retained per telemetry chart
    #[serde(default = "default_chart_window")]
    pub chart_window: usize,

    /// Log lines buffered per selection
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Alert/event records retained in history
    #[serde(default = "default_alert_history")]
    pub alert_history: usize,

    /// Thresholds and notification channels
    #[serde(default)]
    pub alerts: AlertConfig,
}

fn default_chart_window() -> usize {
    CHART_WINDOW
}
fn default_log_capacity() -> usize {
    LOG_CAPACITY
}
fn default_alert_history() -> usize {
    500
}

impl Default for WharfConfig {
    fn default() -> Self {
        Self {
            theme: ThemeChoice::default(),
            chart_window: default_chart_window(),
            log_capacity: default_log_capacity(),
            alert_history: default_alert_history(),
            alerts: AlertConfig::default(),
        }
    }
}

/// Configuration loading/saving errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Yaml(e) => write!(f, "YAML parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl WharfConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load configuration from a string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Write the configuration back (settings and theme changes persist
    /// through this).
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Search for a config file in the working directory. Returns the
    /// path that will also be used for saving, plus the parsed config
    /// when one exists.
    pub fn discover(start_dir: &Path) -> (PathBuf, Option<Result<Self, ConfigError>>) {
        let names = ["wharf.yaml", "wharf.yml", ".wharf.yaml", ".wharf.yml"];
        for name in &names {
            let path = start_dir.join(name);
            if path.exists() {
                let loaded = Self::load(&path);
                return (path, Some(loaded));
            }
        }
        (start_dir.join(names[1]), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_config() {
        let config = WharfConfig::from_str("{}").unwrap();
        assert_eq!(config.theme, ThemeChoice::Dark);
        assert_eq!(config.chart_window, 20);
        assert_eq!(config.log_capacity, 2000);
        assert_eq!(config.alerts.cpu_limit, 80);
        assert_eq!(config.alerts.mem_limit, 90);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
theme: high-contrast
chart_window: 40
alerts:
  cpu_limit: 75
  slack_webhook: "https://hooks.slack.com/services/T0/B0/x"
  slack_enabled: true
"#;
        let config = WharfConfig::from_str(yaml).unwrap();
        assert_eq!(config.theme, ThemeChoice::HighContrast);
        assert_eq!(config.chart_window, 40);
        assert_eq!(config.log_capacity, 2000);
        assert_eq!(config.alerts.cpu_limit, 75);
        assert!(config.alerts.slack_enabled);
    }

    #[test]
    fn test_roundtrip_preserves_alerts() {
        let mut config = WharfConfig::default();
        config.alerts.cpu_limit = 60;
        config.alerts.generic_webhook = "https://example.com/hook".into();
        config.alerts.generic_enabled = true;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let back = WharfConfig::from_str(&yaml).unwrap();
        assert_eq!(back.alerts, config.alerts);
    }

    #[test]
    fn test_theme_cycle() {
        assert_eq!(ThemeChoice::Dark.cycle(), ThemeChoice::HighContrast);
        assert_eq!(ThemeChoice::HighContrast.cycle(), ThemeChoice::Dark);
    }
}
