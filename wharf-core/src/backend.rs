//! Backend trait for collaborator surfaces
//!
//! A backend is the pluggable side of the dashboard that actually talks
//! to a container daemon: one-shot requests return results, server-push
//! subscriptions hand back a channel receiver the session consumes until
//! it is dropped.

use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::alert::{AlertConfig, AlertRecord};
use crate::model::ContainerSummary;
use crate::series::StatsSample;

/// Errors surfaced by backend operations
#[derive(Clone, Debug)]
pub enum BackendError {
    /// The stream or request could not be established or completed
    Transport { message: String },
    /// Structured error payload returned by the collaborator; rendered
    /// verbatim, never swallowed
    Declared {
        error: String,
        message: Option<String>,
        details: Option<String>,
        install_command: Option<String>,
    },
}

impl BackendError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn declared(error: impl Into<String>) -> Self {
        Self::Declared {
            error: error.into(),
            message: None,
            details: None,
            install_command: None,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport { message } => write!(f, "{}", message),
            BackendError::Declared {
                error,
                message,
                details,
                install_command,
            } => {
                write!(f, "{}", error)?;
                if let Some(m) = message {
                    write!(f, ": {}", m)?;
                }
                if let Some(d) = details {
                    write!(f, " ({})", d)?;
                }
                if let Some(cmd) = install_command {
                    write!(f, " (install with: {})", cmd)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Volume usage for one container: a report while running, or the
/// stopped marker when sizes cannot be computed.
#[derive(Clone, Debug, PartialEq)]
pub enum VolumeUsage {
    Report(VolumeReport),
    Stopped,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VolumeReport {
    pub total_mb: u64,
    pub mounts: Vec<MountUsage>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MountUsage {
    pub path: String,
    /// None when the size is unknown (bind mounts)
    pub size_mb: Option<u64>,
}

/// One image row of the images view.
#[derive(Clone, Debug)]
pub struct ImageSummary {
    /// Full image id including digest prefix
    pub id: String,
    pub tags: Vec<String>,
    pub size_mb: u64,
    /// Creation date, already rendered for display
    pub created: String,
}

impl ImageSummary {
    pub fn display_tag(&self) -> &str {
        self.tags.first().map(|t| t.as_str()).unwrap_or("<none>")
    }
}

/// One layer of an image's build history.
#[derive(Clone, Debug)]
pub struct ImageLayer {
    pub created_by: String,
    pub size_mb: u64,
    pub created: String,
}

/// Progress event of a streaming image pull.
#[derive(Clone, Debug, Default)]
pub struct PullProgress {
    pub status: Option<String>,
    pub progress: Option<String>,
    pub error: Option<String>,
}

/// Daemon version blob plus disk-usage totals for the system view.
#[derive(Clone, Debug)]
pub struct SystemOverview {
    /// Version response verbatim, for the raw-JSON toggle
    pub version: serde_json::Value,
    pub df: DiskUsage,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DiskUsage {
    pub images: UsageBucket,
    pub containers: UsageBucket,
    pub volumes: UsageBucket,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UsageBucket {
    pub count: usize,
    pub total_bytes: u64,
}

/// Result of a test-notification request.
#[derive(Clone, Debug)]
pub struct AlertTestOutcome {
    pub success: bool,
    pub message: String,
}

/// The collaborator surface the dashboard consumes. Subscriptions
/// deliver messages in receipt order until the receiver is dropped or
/// the backend closes its side; no retry or reconnection is attempted
/// on either side.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable name of this backend
    fn name(&self) -> &'static str;

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError>;

    /// Open the log subscription for one container. Each item is an
    /// opaque text line; an Err item reports a stream failure.
    async fn open_log_stream(
        &self,
        id: &str,
    ) -> Result<mpsc::Receiver<Result<String, BackendError>>, BackendError>;

    /// Open the stats subscription for one container. An Err item is
    /// the error payload delivered in place of a sample.
    async fn open_stats_stream(
        &self,
        id: &str,
    ) -> Result<mpsc::Receiver<Result<StatsSample, BackendError>>, BackendError>;

    async fn volume_usage(&self, id: &str) -> Result<VolumeUsage, BackendError>;

    /// Alert/event history, most recent first.
    async fn alert_history(&self) -> Result<Vec<AlertRecord>, BackendError>;

    /// Append a record to the history (threshold breaches raised by the
    /// stats relay land here).
    async fn record_alert(&self, record: AlertRecord);

    async fn alert_config(&self) -> Result<AlertConfig, BackendError>;

    async fn save_alert_config(&self, config: &AlertConfig) -> Result<(), BackendError>;

    async fn send_test_alert(&self) -> Result<AlertTestOutcome, BackendError>;

    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError>;

    /// Streaming pull; progress events arrive until the channel closes.
    async fn pull_image(
        &self,
        reference: &str,
    ) -> Result<mpsc::Receiver<PullProgress>, BackendError>;

    async fn image_history(&self, id: &str) -> Result<Vec<ImageLayer>, BackendError>;

    /// Vulnerability scan report, verbatim JSON.
    async fn scan_image(&self, reference: &str) -> Result<serde_json::Value, BackendError>;

    async fn remove_image(&self, id: &str) -> Result<(), BackendError>;

    async fn system_overview(&self) -> Result<SystemOverview, BackendError>;
}

/// Capped in-memory alert history, newest first.
#[derive(Debug)]
pub struct AlertStore {
    cap: usize,
    records: VecDeque<AlertRecord>,
}

impl AlertStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            records: VecDeque::new(),
        }
    }

    pub fn push(&mut self, record: AlertRecord) {
        self.records.push_front(record);
        while self.records.len() > self.cap {
            self.records.pop_back();
        }
    }

    pub fn snapshot(&self) -> Vec<AlertRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertLevel;

    #[test]
    fn test_declared_error_rendered_verbatim() {
        let err = BackendError::Declared {
            error: "Scanner not found".into(),
            message: Some("trivy is not installed".into()),
            details: Some("exit code 127".into()),
            install_command: Some("brew install trivy".into()),
        };
        let text = err.to_string();
        assert!(text.contains("Scanner not found"));
        assert!(text.contains("trivy is not installed"));
        assert!(text.contains("exit code 127"));
        assert!(text.contains("brew install trivy"));
    }

    #[test]
    fn test_alert_store_caps_newest_first() {
        let mut store = AlertStore::new(3);
        for i in 0..5 {
            store.push(AlertRecord {
                timestamp: format!("2024-03-01T10:00:0{}", i),
                level: AlertLevel::Info,
                container: "api".into(),
                message: format!("m{}", i),
            });
        }
        assert_eq!(store.len(), 3);
        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].message, "m4");
        assert_eq!(snapshot[2].message, "m2");
    }
}
