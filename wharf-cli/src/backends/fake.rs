//! Scripted backend for demo mode and tests
//!
//! Serves a fixed container list, synthetic log and stats streams, and
//! an in-memory alert history. Everything is deterministic apart from
//! wall-clock timestamps, so session tests can assert on content.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use wharf_core::alert::{AlertConfig, AlertRecord};
use wharf_core::backend::{
    AlertStore, AlertTestOutcome, Backend, BackendError, DiskUsage, ImageLayer, ImageSummary,
    MountUsage, PullProgress, SystemOverview, UsageBucket, VolumeReport, VolumeUsage,
};
use wharf_core::model::ContainerSummary;
use wharf_core::series::StatsSample;

const LOG_TICK: Duration = Duration::from_millis(25);
const STATS_TICK: Duration = Duration::from_millis(30);

fn scripted_containers() -> Vec<ContainerSummary> {
    vec![
        ContainerSummary {
            id: "f1a2b3c4d5e6f708192a3b4c5d6e7f80".into(),
            name: "web".into(),
            image: "nginx:latest".into(),
            status: "Up 2 hours".into(),
            state: "running".into(),
            uptime: "2 hours".into(),
            ports: vec!["0.0.0.0:8080->80/tcp".into()],
        },
        ContainerSummary {
            id: "a1b2c3d4e5f60718293a4b5c6d7e8f90".into(),
            name: "worker".into(),
            image: "python:3.12-slim".into(),
            status: "Up 40 minutes".into(),
            state: "running".into(),
            uptime: "40 minutes".into(),
            ports: vec![],
        },
        ContainerSummary {
            id: "0fedcba987654321fedcba9876543210".into(),
            name: "db".into(),
            image: "postgres:16".into(),
            status: "Exited (0) 3 minutes ago".into(),
            state: "exited".into(),
            uptime: "—".into(),
            ports: vec!["5432/tcp".into()],
        },
    ]
}

fn seed_history() -> Vec<AlertRecord> {
    vec![
        AlertRecord::ingest(
            "2024-03-01T10:00:00",
            "State Change",
            "web",
            "container started",
        ),
        AlertRecord::ingest(
            "2024-03-01T09:55:00",
            "CPU High",
            "worker",
            "CPU usage 93.0% exceeds limit 80%",
        ),
        AlertRecord::ingest("2024-03-01T09:50:00", "Info", "db", "container created"),
    ]
}

pub struct FakeBackend {
    containers: Vec<ContainerSummary>,
    alerts: Arc<Mutex<AlertStore>>,
    config: Arc<Mutex<AlertConfig>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let mut store = AlertStore::new(500);
        for record in seed_history().into_iter().rev() {
            store.push(record);
        }
        Self {
            containers: scripted_containers(),
            alerts: Arc::new(Mutex::new(store)),
            config: Arc::new(Mutex::new(AlertConfig::default())),
        }
    }

    fn find(&self, id: &str) -> Result<&ContainerSummary, BackendError> {
        self.containers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| BackendError::transport(format!("no such container: {}", id)))
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic stats curve: a slow triangle wave per metric so the
/// charts visibly move in demo mode.
fn scripted_sample(tick: u64) -> StatsSample {
    let phase = (tick % 20) as f64;
    let wave = if phase < 10.0 { phase } else { 20.0 - phase };
    StatsSample {
        cpu_pct: 15.0 + wave * 6.0,
        mem_used_mb: 220.0 + wave * 8.0,
        mem_limit_mb: 1024.0,
        net_rx_mb: 1.2 + tick as f64 * 0.05,
        net_tx_mb: 0.4 + tick as f64 * 0.02,
        disk_read_mb: 8.0 + tick as f64 * 0.1,
        disk_write_mb: 2.0 + tick as f64 * 0.04,
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        Ok(self.containers.clone())
    }

    async fn open_log_stream(
        &self,
        id: &str,
    ) -> Result<mpsc::Receiver<Result<String, BackendError>>, BackendError> {
        let container = self.find(id)?.clone();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LOG_TICK);
            if container.is_running() {
                let mut n = 0u64;
                loop {
                    interval.tick().await;
                    n += 1;
                    let line = format!("[{}] request {} handled in {}ms", container.name, n, 3 + n % 17);
                    if tx.send(Ok(line)).await.is_err() {
                        break;
                    }
                }
            } else {
                // A stopped container still has a log tail; deliver it
                // and end the stream.
                for n in 1..=5u64 {
                    interval.tick().await;
                    let line = format!("[{}] shutdown step {}", container.name, n);
                    if tx.send(Ok(line)).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn open_stats_stream(
        &self,
        id: &str,
    ) -> Result<mpsc::Receiver<Result<StatsSample, BackendError>>, BackendError> {
        let container = self.find(id)?.clone();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATS_TICK);
            if container.is_running() {
                let mut tick = 0u64;
                loop {
                    interval.tick().await;
                    tick += 1;
                    if tx.send(Ok(scripted_sample(tick))).await.is_err() {
                        break;
                    }
                }
            } else {
                interval.tick().await;
                let _ = tx
                    .send(Err(BackendError::declared("container is not running")))
                    .await;
            }
        });

        Ok(rx)
    }

    async fn volume_usage(&self, id: &str) -> Result<VolumeUsage, BackendError> {
        let container = self.find(id)?;
        if !container.is_running() {
            return Ok(VolumeUsage::Stopped);
        }
        Ok(VolumeUsage::Report(VolumeReport {
            total_mb: 42,
            mounts: vec![
                MountUsage {
                    path: "/data".into(),
                    size_mb: Some(40),
                },
                MountUsage {
                    path: "/var/log/app".into(),
                    size_mb: None,
                },
            ],
        }))
    }

    async fn alert_history(&self) -> Result<Vec<AlertRecord>, BackendError> {
        Ok(self.alerts.lock().await.snapshot())
    }

    async fn record_alert(&self, record: AlertRecord) {
        self.alerts.lock().await.push(record);
    }

    async fn alert_config(&self) -> Result<AlertConfig, BackendError> {
        Ok(self.config.lock().await.clone())
    }

    async fn save_alert_config(&self, config: &AlertConfig) -> Result<(), BackendError> {
        *self.config.lock().await = config.clone();
        Ok(())
    }

    async fn send_test_alert(&self) -> Result<AlertTestOutcome, BackendError> {
        let config = self.config.lock().await.clone();
        let channels = config.enabled_channels();
        if channels.is_empty() {
            return Ok(AlertTestOutcome {
                success: false,
                message: "no notification channels enabled".into(),
            });
        }
        let names: Vec<&str> = channels.iter().map(|c| c.label()).collect();
        let message = format!("test notification recorded for: {}", names.join(", "));
        self.record_alert(AlertRecord::ingest(
            crate::session::alert_timestamp(),
            "Test",
            "-",
            message.clone(),
        ))
        .await;
        Ok(AlertTestOutcome {
            success: true,
            message,
        })
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        Ok(vec![
            ImageSummary {
                id: "sha256:1111aaaa2222bbbb3333cccc4444dddd".into(),
                tags: vec!["nginx:latest".into()],
                size_mb: 187,
                created: "2024-02-20".into(),
            },
            ImageSummary {
                id: "sha256:5555eeee6666ffff7777aaaa8888bbbb".into(),
                tags: vec!["postgres:16".into()],
                size_mb: 412,
                created: "2024-01-11".into(),
            },
        ])
    }

    async fn pull_image(
        &self,
        reference: &str,
    ) -> Result<mpsc::Receiver<PullProgress>, BackendError> {
        let reference = reference.to_string();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let steps = [
                format!("Pulling from {}", reference),
                "Downloading".to_string(),
                "Extracting".to_string(),
                "Pull complete".to_string(),
            ];
            for (i, status) in steps.iter().enumerate() {
                tokio::time::sleep(Duration::from_millis(40)).await;
                let progress = PullProgress {
                    status: Some(status.clone()),
                    progress: (i == 1 || i == 2).then(|| format!("[{}>] {}%", "=".repeat(i * 8), i * 33)),
                    error: None,
                };
                if tx.send(progress).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn image_history(&self, _id: &str) -> Result<Vec<ImageLayer>, BackendError> {
        Ok(vec![
            ImageLayer {
                created_by: "CMD [\"nginx\" \"-g\" \"daemon off;\"]".into(),
                size_mb: 0,
                created: "2024-02-20".into(),
            },
            ImageLayer {
                created_by: "COPY docker-entrypoint.sh /".into(),
                size_mb: 1,
                created: "2024-02-20".into(),
            },
            ImageLayer {
                created_by: "ADD rootfs.tar.xz /".into(),
                size_mb: 112,
                created: "2024-02-19".into(),
            },
        ])
    }

    async fn scan_image(&self, reference: &str) -> Result<serde_json::Value, BackendError> {
        Ok(serde_json::json!({
            "ArtifactName": reference,
            "Results": [
                { "Target": reference, "Vulnerabilities": [] }
            ]
        }))
    }

    async fn remove_image(&self, _id: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn system_overview(&self) -> Result<SystemOverview, BackendError> {
        Ok(SystemOverview {
            version: serde_json::json!({
                "Version": "0.0-fake",
                "ApiVersion": "1.45",
                "Os": "linux",
                "Arch": "amd64",
                "KernelVersion": "6.8.0-fake",
                "GoVersion": "go1.22.1",
                "GitCommit": "0000000",
            }),
            df: DiskUsage {
                images: UsageBucket {
                    count: 2,
                    total_bytes: 628 * 1024 * 1024,
                },
                containers: UsageBucket {
                    count: 3,
                    total_bytes: 51 * 1024 * 1024,
                },
                volumes: UsageBucket {
                    count: 1,
                    total_bytes: 42 * 1024 * 1024,
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_list_is_stable() {
        let backend = FakeBackend::new();
        let containers = backend.list_containers().await.unwrap();
        assert_eq!(containers.len(), 3);
        assert!(containers[0].is_running());
        assert!(containers[1].is_running());
        assert!(!containers[2].is_running());
    }

    #[tokio::test]
    async fn test_stopped_container_stats_error() {
        let backend = FakeBackend::new();
        let stopped = backend.list_containers().await.unwrap()[2].clone();
        let mut rx = backend.open_stats_stream(&stopped.id).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert!(first.is_err());
        // Error payload ends the subscription.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_volume_usage_for_stopped() {
        let backend = FakeBackend::new();
        let containers = backend.list_containers().await.unwrap();
        assert!(matches!(
            backend.volume_usage(&containers[2].id).await.unwrap(),
            VolumeUsage::Stopped
        ));
        assert!(matches!(
            backend.volume_usage(&containers[0].id).await.unwrap(),
            VolumeUsage::Report(_)
        ));
    }

    #[tokio::test]
    async fn test_test_alert_requires_enabled_channel() {
        let backend = FakeBackend::new();
        let outcome = backend.send_test_alert().await.unwrap();
        assert!(!outcome.success);

        let mut config = AlertConfig::default();
        config.slack_webhook = "https://hooks.slack.com/services/T0/B0/x".into();
        config.slack_enabled = true;
        backend.save_alert_config(&config).await.unwrap();

        let before = backend.alert_history().await.unwrap().len();
        let outcome = backend.send_test_alert().await.unwrap();
        assert!(outcome.success);
        assert!(outcome.message.contains("Slack"));
        assert_eq!(backend.alert_history().await.unwrap().len(), before + 1);
    }

    #[tokio::test]
    async fn test_unknown_container_is_transport_error() {
        let backend = FakeBackend::new();
        assert!(backend.open_log_stream("nope").await.is_err());
        assert!(backend.open_stats_stream("nope").await.is_err());
    }
}
