//! Stream session lifecycle
//!
//! One session owns the log subscription and the stats subscription of
//! the currently selected container. Sessions are created on selection
//! and closed on re-selection or navigation away; close aborts both
//! relay tasks and is idempotent. Every event a session emits carries
//! its session token, so the reducer can drop stragglers from a
//! superseded session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use chrono::{Local, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use wharf_core::alert::{AlertConfig, AlertRecord, ThresholdWatch};
use wharf_core::backend::Backend;
use wharf_core::model::ContainerSummary;
use wharf_core::reducer::{DashboardEvent, EventEnvelope};
use wharf_core::state::SessionId;

/// Broadcast sender plus the shared sequence counter, cloned into every
/// task that emits dashboard events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
    next_seq: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DashboardEvent) {
        let _ = self.tx.send(EventEnvelope {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            at: SystemTime::now(),
            event,
        });
    }
}

pub fn next_session_id() -> SessionId {
    Uuid::new_v4().to_string()
}

/// Timestamp format of ingested alert records: naive UTC without the
/// zone marker, matching what the history surface delivers.
pub fn alert_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn chart_label() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// The open subscription pair for one selection.
pub struct StreamSession {
    id: SessionId,
    container_id: String,
    log_task: Option<JoinHandle<()>>,
    stats_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl StreamSession {
    /// Open both subscriptions for `container` and start relaying their
    /// messages onto the bus in receipt order. The caller mints the
    /// session token (and arms the reducer with it) before opening, so
    /// no early message is lost to the stale-session guard. Threshold
    /// breaches are evaluated on the stats relay and recorded into
    /// backend history.
    pub async fn open(
        backend: Arc<dyn Backend>,
        container: &ContainerSummary,
        id: SessionId,
        bus: EventBus,
        thresholds: &AlertConfig,
    ) -> StreamSession {
        let log_task = match backend.open_log_stream(&container.id).await {
            Ok(mut rx) => {
                let bus = bus.clone();
                let session = id.clone();
                Some(tokio::spawn(async move {
                    while let Some(item) = rx.recv().await {
                        match item {
                            Ok(text) => {
                                bus.emit(DashboardEvent::LogLine {
                                    session: session.clone(),
                                    text,
                                });
                            }
                            Err(e) => {
                                bus.emit(DashboardEvent::LogStreamFailed {
                                    session: session.clone(),
                                    message: e.to_string(),
                                });
                                break;
                            }
                        }
                    }
                }))
            }
            Err(e) => {
                bus.emit(DashboardEvent::LogStreamFailed {
                    session: id.clone(),
                    message: e.to_string(),
                });
                None
            }
        };

        let stats_task = match backend.open_stats_stream(&container.id).await {
            Ok(mut rx) => {
                let bus = bus.clone();
                let session = id.clone();
                let container_name = container.name.clone();
                let backend = backend.clone();
                let mut watch = ThresholdWatch::new(thresholds);
                Some(tokio::spawn(async move {
                    loop {
                        match rx.recv().await {
                            Some(Ok(sample)) => {
                                for breach in watch.observe(&sample) {
                                    let record = AlertRecord::ingest(
                                        alert_timestamp(),
                                        "High",
                                        container_name.clone(),
                                        breach.message(),
                                    );
                                    backend.record_alert(record.clone()).await;
                                    bus.emit(DashboardEvent::AlertRaised { record });
                                }
                                bus.emit(DashboardEvent::StatsTick {
                                    session: session.clone(),
                                    label: chart_label(),
                                    sample,
                                });
                            }
                            Some(Err(e)) => {
                                // Error payload in place of a sample: the
                                // stats subscription ends here, the log
                                // subscription stays open.
                                bus.emit(DashboardEvent::StatsError {
                                    session: session.clone(),
                                    message: e.to_string(),
                                });
                                break;
                            }
                            None => {
                                bus.emit(DashboardEvent::StatsError {
                                    session: session.clone(),
                                    message: "stats stream ended".into(),
                                });
                                break;
                            }
                        }
                    }
                }))
            }
            Err(e) => {
                bus.emit(DashboardEvent::StatsError {
                    session: id.clone(),
                    message: e.to_string(),
                });
                None
            }
        };

        StreamSession {
            id,
            container_id: container.id.clone(),
            log_task,
            stats_task,
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    #[allow(dead_code)]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Release both subscriptions unconditionally. Closing an already
    /// closed session is a no-op, never an error.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(task) = self.log_task.take() {
            task.abort();
        }
        if let Some(task) = self.stats_task.take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// One-shot volume usage fetch, session-tagged like the streams so a
/// late response for a superseded selection is dropped.
pub fn spawn_volume_fetch(
    backend: Arc<dyn Backend>,
    container_id: String,
    session: SessionId,
    bus: EventBus,
) {
    tokio::spawn(async move {
        bus.emit(DashboardEvent::VolumePending {
            session: session.clone(),
        });
        match backend.volume_usage(&container_id).await {
            Ok(usage) => bus.emit(DashboardEvent::VolumeLoaded { session, usage }),
            Err(e) => bus.emit(DashboardEvent::VolumeFailed {
                session,
                message: e.to_string(),
            }),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake::FakeBackend;
    use tokio::sync::broadcast::error::RecvError;
    use wharf_core::reducer::reduce;
    use wharf_core::state::DashboardState;

    async fn drain_into(
        state: &mut DashboardState,
        rx: &mut broadcast::Receiver<EventEnvelope>,
    ) {
        loop {
            match rx.try_recv() {
                Ok(env) => reduce(state, &env),
                Err(_) => break,
            }
        }
    }

    #[tokio::test]
    async fn test_session_delivers_tagged_events() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
        let containers = backend.list_containers().await.unwrap();
        let running = containers.iter().find(|c| c.is_running()).unwrap();

        let bus = EventBus::new(1024);
        let mut rx = bus.subscribe();
        let mut session = StreamSession::open(
            backend,
            running,
            next_session_id(),
            bus.clone(),
            &AlertConfig::default(),
        )
        .await;

        let mut saw_log = false;
        let mut saw_stats = false;
        for _ in 0..64 {
            match rx.recv().await {
                Ok(env) => match env.event {
                    DashboardEvent::LogLine { session: s, .. } => {
                        assert_eq!(s, session.id());
                        saw_log = true;
                    }
                    DashboardEvent::StatsTick { session: s, .. } => {
                        assert_eq!(s, session.id());
                        saw_stats = true;
                    }
                    _ => {}
                },
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => continue,
            }
            if saw_log && saw_stats {
                break;
            }
        }
        assert!(saw_log);
        assert!(saw_stats);

        session.close();
        assert!(session.is_closed());
        // Second close is a no-op.
        session.close();
    }

    #[tokio::test]
    async fn test_stopped_container_errors_stats_keeps_logs() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
        let containers = backend.list_containers().await.unwrap();
        let stopped = containers.iter().find(|c| !c.is_running()).unwrap();

        let bus = EventBus::new(1024);
        let mut rx = bus.subscribe();
        let mut session = StreamSession::open(
            backend,
            stopped,
            next_session_id(),
            bus.clone(),
            &AlertConfig::default(),
        )
        .await;

        let mut saw_stats_error = false;
        let mut saw_log = false;
        for _ in 0..64 {
            match rx.recv().await {
                Ok(env) => match env.event {
                    DashboardEvent::StatsError { session: s, .. } => {
                        assert_eq!(s, session.id());
                        saw_stats_error = true;
                    }
                    DashboardEvent::LogLine { .. } => saw_log = true,
                    _ => {}
                },
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => continue,
            }
            if saw_stats_error && saw_log {
                break;
            }
        }
        assert!(saw_stats_error);
        assert!(saw_log);
        session.close();
    }

    #[tokio::test]
    async fn test_reselection_drops_superseded_session_messages() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
        let containers = backend.list_containers().await.unwrap();
        let a = &containers[0];
        let b = &containers[1];

        let bus = EventBus::new(4096);
        let mut rx = bus.subscribe();
        let mut state = DashboardState::new();

        let sid_a = next_session_id();
        state.begin_selection(sid_a.clone(), a.clone());
        let mut session_a = StreamSession::open(
            backend.clone(),
            a,
            sid_a,
            bus.clone(),
            &AlertConfig::default(),
        )
        .await;

        // Let A produce something, then re-select B: the old session is
        // closed fully before the new one opens.
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        session_a.close();
        let sid_b = next_session_id();
        state.begin_selection(sid_b.clone(), b.clone());
        let session_b = StreamSession::open(
            backend.clone(),
            b,
            sid_b,
            bus.clone(),
            &AlertConfig::default(),
        )
        .await;

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        drain_into(&mut state, &mut rx).await;

        // Only the single subscription pair of B is open, and nothing
        // from A survived into B's buffers.
        assert!(session_a.is_closed());
        assert!(!session_b.is_closed());
        for line in state.logs.iter() {
            assert!(
                line.contains(&b.name),
                "line from superseded session rendered: {}",
                line
            );
        }
    }
}
