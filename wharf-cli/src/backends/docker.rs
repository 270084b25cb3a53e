//! Docker Engine backend
//!
//! Realizes the collaborator surface against the local daemon: one-shot
//! requests go straight to the API, subscriptions are bollard streams
//! pumped into channels, and the alert history is an in-memory store
//! fed by the daemon's event stream plus recorded threshold breaches.

use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::{ListContainersOptions, LogsOptions, Stats, StatsOptions};
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::models::{EventMessage, EventMessageTypeEnum, MountPointTypeEnum, Port};
use bollard::system::EventsOptions;
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::{mpsc, Mutex};

use wharf_core::alert::{AlertConfig, AlertRecord};
use wharf_core::backend::{
    AlertStore, AlertTestOutcome, Backend, BackendError, DiskUsage, ImageLayer, ImageSummary,
    MountUsage, PullProgress, SystemOverview, UsageBucket, VolumeReport, VolumeUsage,
};
use wharf_core::model::ContainerSummary;
use wharf_core::series::StatsSample;

use crate::session::alert_timestamp;

const MIB: f64 = 1024.0 * 1024.0;

pub struct DockerBackend {
    docker: Docker,
    alerts: Arc<Mutex<AlertStore>>,
    config: Arc<Mutex<AlertConfig>>,
}

impl DockerBackend {
    /// Connect to the local daemon and start the event watcher that
    /// feeds the alert history.
    pub async fn connect(
        initial_config: AlertConfig,
        history_cap: usize,
    ) -> Result<Self, BackendError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| BackendError::transport(format!("failed to connect to Docker: {}", e)))?;

        docker
            .ping()
            .await
            .map_err(|e| BackendError::transport(format!("Docker ping failed: {}", e)))?;

        let backend = Self {
            docker,
            alerts: Arc::new(Mutex::new(AlertStore::new(history_cap))),
            config: Arc::new(Mutex::new(initial_config)),
        };
        backend.spawn_event_watcher();
        Ok(backend)
    }

    /// Watch daemon events and ingest container lifecycle transitions
    /// into the history. No reconnection on stream failure.
    fn spawn_event_watcher(&self) {
        let docker = self.docker.clone();
        let alerts = self.alerts.clone();

        tokio::spawn(async move {
            let mut stream = docker.events(None::<EventsOptions<String>>);
            while let Some(item) = stream.next().await {
                let Ok(msg) = item else { break };
                if let Some(record) = event_to_record(&msg) {
                    alerts.lock().await.push(record);
                }
            }
        });
    }
}

/// Map a daemon event to a history record; uninteresting events map to
/// None.
fn event_to_record(msg: &EventMessage) -> Option<AlertRecord> {
    if msg.typ != Some(EventMessageTypeEnum::CONTAINER) {
        return None;
    }
    let action = msg.action.as_deref()?.split(':').next()?.trim().to_string();
    let raw_level = match action.as_str() {
        "oom" => "High",
        "start" | "stop" | "die" | "kill" | "restart" | "pause" | "unpause" | "destroy" => "State",
        "create" => "Info",
        _ => return None,
    };
    let container = msg
        .actor
        .as_ref()
        .and_then(|a| a.attributes.as_ref())
        .and_then(|attrs| attrs.get("name").cloned())
        .unwrap_or_else(|| "unknown".into());
    let timestamp = msg
        .time
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(alert_timestamp);

    Some(AlertRecord::ingest(
        timestamp,
        raw_level,
        container,
        format!("container {}", action),
    ))
}

fn format_port(p: &Port) -> String {
    let proto = p
        .typ
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "tcp".into());
    match (p.ip.as_deref(), p.public_port) {
        (Some(ip), Some(public)) => format!("{}:{}->{}/{}", ip, public, p.private_port, proto),
        (None, Some(public)) => format!("{}->{}/{}", public, p.private_port, proto),
        _ => format!("{}/{}", p.private_port, proto),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// The standard Docker CPU percentage: usage delta over system delta,
/// scaled by online CPUs. Cumulative network and block-io counters are
/// reported as running MB totals, one value per subscription tick.
fn stats_to_sample(s: &Stats) -> StatsSample {
    let cpu_delta = s
        .cpu_stats
        .cpu_usage
        .total_usage
        .saturating_sub(s.precpu_stats.cpu_usage.total_usage) as f64;
    let sys_delta = match (
        s.cpu_stats.system_cpu_usage,
        s.precpu_stats.system_cpu_usage,
    ) {
        (Some(cur), Some(prev)) => cur.saturating_sub(prev) as f64,
        _ => 0.0,
    };
    let online = s
        .cpu_stats
        .online_cpus
        .filter(|n| *n > 0)
        .unwrap_or_else(|| {
            s.cpu_stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map(|v| v.len() as u64)
                .unwrap_or(1)
        }) as f64;
    let cpu_pct = if sys_delta > 0.0 {
        round2(cpu_delta / sys_delta * online * 100.0)
    } else {
        0.0
    };

    let mem_used_mb = round2(s.memory_stats.usage.unwrap_or(0) as f64 / MIB);
    let mem_limit_mb = round2(s.memory_stats.limit.unwrap_or(0) as f64 / MIB);

    let (rx, tx) = s
        .networks
        .as_ref()
        .map(|nets| {
            nets.values().fold((0u64, 0u64), |(rx, tx), n| {
                (rx + n.rx_bytes, tx + n.tx_bytes)
            })
        })
        .unwrap_or((0, 0));

    let (read, write) = s
        .blkio_stats
        .io_service_bytes_recursive
        .as_ref()
        .map(|entries| {
            entries.iter().fold((0u64, 0u64), |(r, w), e| {
                if e.op.eq_ignore_ascii_case("read") {
                    (r + e.value, w)
                } else if e.op.eq_ignore_ascii_case("write") {
                    (r, w + e.value)
                } else {
                    (r, w)
                }
            })
        })
        .unwrap_or((0, 0));

    StatsSample {
        cpu_pct,
        mem_used_mb,
        mem_limit_mb,
        net_rx_mb: round2(rx as f64 / MIB),
        net_tx_mb: round2(tx as f64 / MIB),
        disk_read_mb: round2(read as f64 / MIB),
        disk_write_mb: round2(write as f64 / MIB),
    }
}

fn epoch_date(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".into())
}

#[async_trait]
impl Backend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let list = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| BackendError::transport(format!("list containers: {}", e)))?;

        let mut out = Vec::with_capacity(list.len());
        for c in list {
            let id = c.id.unwrap_or_default();
            let name = c
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| id.chars().take(12).collect());
            let state = c.state.unwrap_or_default();
            let status = c.status.unwrap_or_default();
            let uptime = if state.eq_ignore_ascii_case("running") {
                status.strip_prefix("Up ").unwrap_or(&status).to_string()
            } else {
                "—".into()
            };
            out.push(ContainerSummary {
                id,
                name,
                image: c.image.unwrap_or_else(|| "unknown".into()),
                status,
                state,
                uptime,
                ports: c
                    .ports
                    .unwrap_or_default()
                    .iter()
                    .map(format_port)
                    .collect(),
            });
        }
        Ok(out)
    }

    async fn open_log_stream(
        &self,
        id: &str,
    ) -> Result<mpsc::Receiver<Result<String, BackendError>>, BackendError> {
        let docker = self.docker.clone();
        let container_id = id.to_string();
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(async move {
            let options = LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                tail: "200".into(),
                ..Default::default()
            };
            let mut stream = docker.logs(&container_id, Some(options));
            while let Some(item) = stream.next().await {
                match item {
                    Ok(log) => {
                        let text = log.to_string().trim_end().to_string();
                        if tx.send(Ok(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(BackendError::transport(format!("log stream: {}", e))))
                            .await;
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
        let docker = self.docker.clone();
        let container_id = id.to_string();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let options = StatsOptions {
                stream: true,
                one_shot: false,
            };
            let mut stream = docker.stats(&container_id, Some(options));
            while let Some(item) = stream.next().await {
                match item {
                    Ok(stats) => {
                        if tx.send(Ok(stats_to_sample(&stats))).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(BackendError::transport(format!("stats stream: {}", e))))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn volume_usage(&self, id: &str) -> Result<VolumeUsage, BackendError> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| BackendError::transport(format!("inspect container: {}", e)))?;

        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        if !running {
            return Ok(VolumeUsage::Stopped);
        }

        // Volume sizes only exist in the daemon-wide disk usage data;
        // join it with this container's mounts.
        let df = self
            .docker
            .df()
            .await
            .map_err(|e| BackendError::transport(format!("disk usage: {}", e)))?;
        let volume_sizes: std::collections::HashMap<String, u64> = df
            .volumes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| {
                let size = v.usage_data.as_ref().map(|u| u.size).unwrap_or(-1);
                (size >= 0).then(|| (v.name.clone(), size as u64 / (1024 * 1024)))
            })
            .collect();

        let mut report = VolumeReport::default();
        for mount in inspect.mounts.unwrap_or_default() {
            let path = mount
                .destination
                .clone()
                .or_else(|| mount.source.clone())
                .unwrap_or_else(|| "?".into());
            let size_mb = if mount.typ == Some(MountPointTypeEnum::VOLUME) {
                mount
                    .name
                    .as_ref()
                    .and_then(|n| volume_sizes.get(n).copied())
            } else {
                None
            };
            if let Some(mb) = size_mb {
                report.total_mb += mb;
            }
            report.mounts.push(MountUsage { path, size_mb });
        }
        Ok(VolumeUsage::Report(report))
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
            alert_timestamp(),
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
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| BackendError::transport(format!("list images: {}", e)))?;

        Ok(images
            .into_iter()
            .map(|img| ImageSummary {
                id: img.id,
                tags: img.repo_tags,
                size_mb: (img.size.max(0) as u64) / (1024 * 1024),
                created: epoch_date(img.created),
            })
            .collect())
    }

    async fn pull_image(
        &self,
        reference: &str,
    ) -> Result<mpsc::Receiver<PullProgress>, BackendError> {
        let docker = self.docker.clone();
        let reference = reference.to_string();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let options = CreateImageOptions::<String> {
                from_image: reference,
                ..Default::default()
            };
            let mut stream = docker.create_image(Some(options), None, None);
            while let Some(item) = stream.next().await {
                let progress = match item {
                    Ok(info) => PullProgress {
                        status: info.status,
                        progress: info.progress,
                        error: info.error,
                    },
                    Err(e) => PullProgress {
                        status: None,
                        progress: None,
                        error: Some(e.to_string()),
                    },
                };
                let failed = progress.error.is_some();
                if tx.send(progress).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn image_history(&self, id: &str) -> Result<Vec<ImageLayer>, BackendError> {
        let layers = self
            .docker
            .image_history(id)
            .await
            .map_err(|e| BackendError::transport(format!("image history: {}", e)))?;

        Ok(layers
            .into_iter()
            .map(|l| ImageLayer {
                created_by: l.created_by,
                size_mb: (l.size.max(0) as u64) / (1024 * 1024),
                created: epoch_date(l.created),
            })
            .collect())
    }

    async fn scan_image(&self, reference: &str) -> Result<serde_json::Value, BackendError> {
        let output = tokio::process::Command::new("trivy")
            .args(["image", "--format", "json", "--quiet", reference])
            .output()
            .await;

        let output = match output {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::Declared {
                    error: "scanner not found".into(),
                    message: Some("trivy is required for image scanning".into()),
                    details: None,
                    install_command: Some("brew install trivy".into()),
                });
            }
            Err(e) => {
                return Err(BackendError::transport(format!("failed to run trivy: {}", e)));
            }
        };

        if !output.status.success() {
            return Err(BackendError::Declared {
                error: "scan failed".into(),
                message: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
                details: output.status.code().map(|c| format!("exit code {}", c)),
                install_command: None,
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| BackendError::transport(format!("unreadable scan report: {}", e)))
    }

    async fn remove_image(&self, id: &str) -> Result<(), BackendError> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_image(id, Some(options), None)
            .await
            .map_err(|e| BackendError::transport(format!("remove image: {}", e)))?;
        Ok(())
    }

    async fn system_overview(&self) -> Result<SystemOverview, BackendError> {
        let version = self
            .docker
            .version()
            .await
            .map_err(|e| BackendError::transport(format!("version: {}", e)))?;
        let df = self
            .docker
            .df()
            .await
            .map_err(|e| BackendError::transport(format!("disk usage: {}", e)))?;

        let images = df.images.unwrap_or_default();
        let containers = df.containers.unwrap_or_default();
        let volumes = df.volumes.unwrap_or_default();

        Ok(SystemOverview {
            version: serde_json::to_value(&version)
                .map_err(|e| BackendError::transport(format!("version encode: {}", e)))?,
            df: DiskUsage {
                images: UsageBucket {
                    count: images.len(),
                    total_bytes: images.iter().map(|i| i.size.max(0) as u64).sum(),
                },
                containers: UsageBucket {
                    count: containers.len(),
                    total_bytes: containers
                        .iter()
                        .map(|c| c.size_rw.unwrap_or(0).max(0) as u64)
                        .sum(),
                },
                volumes: UsageBucket {
                    count: volumes.len(),
                    total_bytes: volumes
                        .iter()
                        .map(|v| v.usage_data.as_ref().map(|u| u.size.max(0) as u64).unwrap_or(0))
                        .sum(),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    #[test]
    fn test_event_classification() {
        let mut attrs = std::collections::HashMap::new();
        attrs.insert("name".to_string(), "web".to_string());
        let msg = EventMessage {
            typ: Some(EventMessageTypeEnum::CONTAINER),
            action: Some("die".into()),
            actor: Some(EventActor {
                id: Some("abc".into()),
                attributes: Some(attrs),
            }),
            time: Some(1_709_287_200),
            ..Default::default()
        };

        let record = event_to_record(&msg).unwrap();
        assert_eq!(record.container, "web");
        assert_eq!(record.level, wharf_core::alert::AlertLevel::State);
        assert!(record.message.contains("die"));
        // Naive UTC, no zone marker: normalized later at display time.
        assert!(!record.timestamp.ends_with('Z'));

        let ignored = EventMessage {
            typ: Some(EventMessageTypeEnum::IMAGE),
            action: Some("pull".into()),
            ..Default::default()
        };
        assert!(event_to_record(&ignored).is_none());
    }

    #[test]
    fn test_port_formatting() {
        let p = Port {
            ip: Some("0.0.0.0".into()),
            private_port: 80,
            public_port: Some(8080),
            typ: None,
        };
        assert_eq!(format_port(&p), "0.0.0.0:8080->80/tcp");

        let unmapped = Port {
            ip: None,
            private_port: 5432,
            public_port: None,
            typ: None,
        };
        assert_eq!(format_port(&unmapped), "5432/tcp");
    }
}
