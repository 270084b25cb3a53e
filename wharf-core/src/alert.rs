//! Alert records, level classification, and notification-channel config
//!
//! Levels are a closed set computed once when a record is ingested; the
//! raw level text from the backend is never re-inspected at render time.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::series::StatsSample;

/// Closed set of alert levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    /// Resource threshold breach
    High,
    /// Container state transition
    State,
    Info,
    Other,
}

impl AlertLevel {
    /// Map raw level text to the closed set. Classification happens once
    /// at ingestion.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.contains("high") {
            Self::High
        } else if lower.contains("state") {
            Self::State
        } else if lower.contains("info") || lower.contains("test") {
            Self::Info
        } else {
            Self::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::State => "STATE",
            Self::Info => "INFO",
            Self::Other => "EVENT",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One row of the alert/event history. Read-only once ingested.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Raw ISO8601 timestamp as delivered; may lack the trailing UTC
    /// marker. Date filtering matches on this string.
    pub timestamp: String,
    pub level: AlertLevel,
    pub container: String,
    pub message: String,
}

impl AlertRecord {
    pub fn ingest(
        timestamp: impl Into<String>,
        raw_level: &str,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            level: AlertLevel::classify(raw_level),
            container: container.into(),
            message: message.into(),
        }
    }

    /// Parsed instant, treating a timestamp without a UTC marker as UTC.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Local wall-clock rendering, falling back to the raw string when
    /// the timestamp does not parse.
    pub fn display_time(&self) -> String {
        match self.parsed_timestamp() {
            Some(dt) => dt
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => self.timestamp.clone(),
        }
    }
}

/// Parse an ISO8601 timestamp, appending the UTC suffix when no zone
/// marker is present so both forms resolve to the same instant.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let has_zone = raw.ends_with('Z') || raw.ends_with('z') || {
        // An offset like +02:00 after the time part
        raw.rfind(['+', '-'])
            .map(|i| i > raw.find('T').unwrap_or(0))
            .unwrap_or(false)
    };
    let candidate = if has_zone {
        raw.to_string()
    } else {
        format!("{}Z", raw)
    };
    DateTime::parse_from_rfc3339(&candidate)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Notification channels addressable by the alert config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Slack,
    Discord,
    Telegram,
    Generic,
}

impl ChannelKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Slack => "Slack",
            Self::Discord => "Discord",
            Self::Telegram => "Telegram",
            Self::Generic => "Generic webhook",
        }
    }
}

/// Alert thresholds plus per-channel notification settings. The flat
/// field layout is the config blob exchanged with the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: u8,
    #[serde(default = "default_mem_limit")]
    pub mem_limit: u8,

    #[serde(default)]
    pub slack_webhook: String,
    #[serde(default)]
    pub slack_enabled: bool,

    #[serde(default)]
    pub discord_webhook: String,
    #[serde(default)]
    pub discord_enabled: bool,

    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub telegram_chat_id: String,
    #[serde(default)]
    pub telegram_enabled: bool,

    #[serde(default)]
    pub generic_webhook: String,
    #[serde(default)]
    pub generic_enabled: bool,
}

fn default_cpu_limit() -> u8 {
    80
}
fn default_mem_limit() -> u8 {
    90
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cpu_limit: default_cpu_limit(),
            mem_limit: default_mem_limit(),
            slack_webhook: String::new(),
            slack_enabled: false,
            discord_webhook: String::new(),
            discord_enabled: false,
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            telegram_enabled: false,
            generic_webhook: String::new(),
            generic_enabled: false,
        }
    }
}

/// A validation failure, one specific message per violated rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigViolation {
    CpuLimitRange,
    MemLimitRange,
    MissingUrl { channel: ChannelKind },
    MalformedUrl { channel: ChannelKind },
    TelegramIncomplete,
}

impl std::fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CpuLimitRange => write!(f, "CPU limit must be between 1 and 100"),
            Self::MemLimitRange => write!(f, "Memory limit must be between 1 and 100"),
            Self::MissingUrl { channel } => {
                write!(f, "{} is enabled but webhook URL is missing", channel.label())
            }
            Self::MalformedUrl { channel } => {
                write!(f, "{} webhook URL is not a valid http(s) URL", channel.label())
            }
            Self::TelegramIncomplete => {
                write!(f, "Telegram is enabled but token or chat ID is missing")
            }
        }
    }
}

impl std::error::Error for ConfigViolation {}

/// A URL a channel can be enabled with: http or https scheme and a
/// non-empty host.
pub fn is_well_formed_url(raw: &str) -> bool {
    let rest = if let Some(r) = raw.strip_prefix("https://") {
        r
    } else if let Some(r) = raw.strip_prefix("http://") {
        r
    } else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    !host.is_empty()
}

impl AlertConfig {
    /// Threshold range checks. A violation here rejects the save.
    pub fn validate_limits(&self) -> Vec<ConfigViolation> {
        let mut violations = Vec::new();
        if self.cpu_limit < 1 || self.cpu_limit > 100 {
            violations.push(ConfigViolation::CpuLimitRange);
        }
        if self.mem_limit < 1 || self.mem_limit > 100 {
            violations.push(ConfigViolation::MemLimitRange);
        }
        violations
    }

    /// Channel checks. A channel enabled without a usable endpoint has
    /// its enabled flag reverted to false; the returned violations say
    /// why. Valid URLs are left untouched and saved verbatim.
    pub fn sanitize_channels(&mut self) -> Vec<ConfigViolation> {
        let mut violations = Vec::new();

        for (kind, url, enabled) in [
            (ChannelKind::Slack, &self.slack_webhook, &mut self.slack_enabled),
            (
                ChannelKind::Discord,
                &self.discord_webhook,
                &mut self.discord_enabled,
            ),
            (
                ChannelKind::Generic,
                &self.generic_webhook,
                &mut self.generic_enabled,
            ),
        ] {
            if !*enabled {
                continue;
            }
            if url.trim().is_empty() {
                *enabled = false;
                violations.push(ConfigViolation::MissingUrl { channel: kind });
            } else if !is_well_formed_url(url.trim()) {
                *enabled = false;
                violations.push(ConfigViolation::MalformedUrl { channel: kind });
            }
        }

        if self.telegram_enabled
            && (self.telegram_bot_token.trim().is_empty() || self.telegram_chat_id.trim().is_empty())
        {
            self.telegram_enabled = false;
            violations.push(ConfigViolation::TelegramIncomplete);
        }

        violations
    }

    /// Channels currently enabled, for the test-notification report.
    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        let mut out = Vec::new();
        if self.slack_enabled {
            out.push(ChannelKind::Slack);
        }
        if self.discord_enabled {
            out.push(ChannelKind::Discord);
        }
        if self.telegram_enabled {
            out.push(ChannelKind::Telegram);
        }
        if self.generic_enabled {
            out.push(ChannelKind::Generic);
        }
        out
    }
}

/// Edge-triggered threshold watcher fed by the stats relay: raises once
/// when a sample crosses above a limit and re-arms when it falls back
/// under.
#[derive(Clone, Debug)]
pub struct ThresholdWatch {
    cpu_limit: f64,
    mem_limit_pct: f64,
    cpu_over: bool,
    mem_over: bool,
}

/// A threshold crossing reported by [`ThresholdWatch::observe`].
#[derive(Clone, Debug, PartialEq)]
pub struct Breach {
    pub metric: BreachMetric,
    pub value: f64,
    pub limit: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreachMetric {
    Cpu,
    Memory,
}

impl Breach {
    pub fn message(&self) -> String {
        match self.metric {
            BreachMetric::Cpu => {
                format!("CPU usage {:.1}% exceeds limit {:.0}%", self.value, self.limit)
            }
            BreachMetric::Memory => format!(
                "Memory usage {:.1}% exceeds limit {:.0}%",
                self.value, self.limit
            ),
        }
    }
}

impl ThresholdWatch {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            cpu_limit: config.cpu_limit as f64,
            mem_limit_pct: config.mem_limit as f64,
            cpu_over: false,
            mem_over: false,
        }
    }

    pub fn observe(&mut self, sample: &StatsSample) -> Vec<Breach> {
        let mut breaches = Vec::new();

        if sample.cpu_pct > self.cpu_limit {
            if !self.cpu_over {
                self.cpu_over = true;
                breaches.push(Breach {
                    metric: BreachMetric::Cpu,
                    value: sample.cpu_pct,
                    limit: self.cpu_limit,
                });
            }
        } else {
            self.cpu_over = false;
        }

        let mem_pct = if sample.mem_limit_mb > 0.0 {
            sample.mem_used_mb / sample.mem_limit_mb * 100.0
        } else {
            0.0
        };
        if mem_pct > self.mem_limit_pct {
            if !self.mem_over {
                self.mem_over = true;
                breaches.push(Breach {
                    metric: BreachMetric::Memory,
                    value: mem_pct,
                    limit: self.mem_limit_pct,
                });
            }
        } else {
            self.mem_over = false;
        }

        breaches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_level() {
        assert_eq!(AlertLevel::classify("CPU High"), AlertLevel::High);
        assert_eq!(AlertLevel::classify("MEM High"), AlertLevel::High);
        assert_eq!(AlertLevel::classify("State Change"), AlertLevel::State);
        assert_eq!(AlertLevel::classify("Info"), AlertLevel::Info);
        assert_eq!(AlertLevel::classify("Test"), AlertLevel::Info);
        assert_eq!(AlertLevel::classify("whatever"), AlertLevel::Other);
    }

    #[test]
    fn test_timestamp_normalization() {
        let bare = parse_timestamp("2024-03-01T10:00:00").unwrap();
        let zulu = parse_timestamp("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(bare, zulu);

        let offset = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(offset, zulu);

        assert!(parse_timestamp("not a timestamp").is_none());
    }

    #[test]
    fn test_record_display_falls_back_to_raw() {
        let r = AlertRecord::ingest("garbage", "Info", "api", "msg");
        assert_eq!(r.display_time(), "garbage");
    }

    #[test]
    fn test_url_check() {
        assert!(is_well_formed_url("https://hooks.slack.com/services/T0/B0/x"));
        assert!(is_well_formed_url("http://localhost:9000/hook"));
        assert!(!is_well_formed_url(""));
        assert!(!is_well_formed_url("hooks.slack.com/services"));
        assert!(!is_well_formed_url("ftp://example.com/hook"));
        assert!(!is_well_formed_url("https://"));
    }

    #[test]
    fn test_limit_validation_messages() {
        let mut config = AlertConfig::default();
        assert!(config.validate_limits().is_empty());

        config.cpu_limit = 0;
        config.mem_limit = 101;
        let violations = config.validate_limits();
        assert_eq!(
            violations,
            vec![ConfigViolation::CpuLimitRange, ConfigViolation::MemLimitRange]
        );
        assert_eq!(
            violations[0].to_string(),
            "CPU limit must be between 1 and 100"
        );
    }

    #[test]
    fn test_sanitize_reverts_bad_channels() {
        let mut config = AlertConfig {
            slack_enabled: true,
            discord_webhook: "not-a-url".into(),
            discord_enabled: true,
            telegram_bot_token: "123:abc".into(),
            telegram_enabled: true,
            ..AlertConfig::default()
        };

        let violations = config.sanitize_channels();
        assert!(!config.slack_enabled);
        assert!(!config.discord_enabled);
        assert!(!config.telegram_enabled);
        assert_eq!(violations.len(), 3);
        assert!(violations.contains(&ConfigViolation::MissingUrl {
            channel: ChannelKind::Slack
        }));
        assert!(violations.contains(&ConfigViolation::MalformedUrl {
            channel: ChannelKind::Discord
        }));
        assert!(violations.contains(&ConfigViolation::TelegramIncomplete));
    }

    #[test]
    fn test_sanitize_keeps_valid_channel_verbatim() {
        let url = "https://hooks.slack.com/services/T0/B0/xyz";
        let mut config = AlertConfig {
            slack_webhook: url.into(),
            slack_enabled: true,
            ..AlertConfig::default()
        };

        let violations = config.sanitize_channels();
        assert!(violations.is_empty());
        assert!(config.slack_enabled);
        assert_eq!(config.slack_webhook, url);
        assert_eq!(config.enabled_channels(), vec![ChannelKind::Slack]);
    }

    #[test]
    fn test_threshold_watch_edge_triggers() {
        let config = AlertConfig {
            cpu_limit: 80,
            mem_limit: 90,
            ..AlertConfig::default()
        };
        let mut watch = ThresholdWatch::new(&config);

        let calm = StatsSample {
            cpu_pct: 10.0,
            mem_used_mb: 100.0,
            mem_limit_mb: 1000.0,
            ..StatsSample::default()
        };
        assert!(watch.observe(&calm).is_empty());

        let hot = StatsSample {
            cpu_pct: 95.0,
            ..calm
        };
        let breaches = watch.observe(&hot);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, BreachMetric::Cpu);

        // Still hot: no repeat until it drops back under the limit.
        assert!(watch.observe(&hot).is_empty());
        assert!(watch.observe(&calm).is_empty());
        assert_eq!(watch.observe(&hot).len(), 1);
    }

    #[test]
    fn test_threshold_watch_memory_pct() {
        let config = AlertConfig {
            mem_limit: 50,
            ..AlertConfig::default()
        };
        let mut watch = ThresholdWatch::new(&config);

        let sample = StatsSample {
            mem_used_mb: 600.0,
            mem_limit_mb: 1000.0,
            ..StatsSample::default()
        };
        let breaches = watch.observe(&sample);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, BreachMetric::Memory);
        assert!(breaches[0].message().contains("60.0%"));
    }
}
