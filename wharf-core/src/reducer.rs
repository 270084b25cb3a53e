use std::time::SystemTime;

use crate::alert::AlertRecord;
use crate::backend::VolumeUsage;
use crate::model::ContainerSummary;
use crate::series::StatsSample;
use crate::state::{DashboardState, NoticeLevel, SessionId, VolumeState};

/// Everything that can happen to the dashboard, delivered over one
/// channel and folded into state by [`reduce`]. Stream-scoped events
/// carry the session token of the session that produced them.
#[derive(Clone, Debug)]
pub enum DashboardEvent {
    ContainersLoaded {
        containers: Vec<ContainerSummary>,
    },
    LogLine {
        session: SessionId,
        text: String,
    },
    /// The log subscription failed mid-stream; the session stops
    /// delivering but stays selected.
    LogStreamFailed {
        session: SessionId,
        message: String,
    },
    StatsTick {
        session: SessionId,
        /// Wall-clock label for the chart point
        label: String,
        sample: StatsSample,
    },
    /// Error payload (or subscription failure) on the stats stream;
    /// flips the selection onto the stopped-classification path.
    StatsError {
        session: SessionId,
        message: String,
    },
    VolumePending {
        session: SessionId,
    },
    VolumeLoaded {
        session: SessionId,
        usage: VolumeUsage,
    },
    VolumeFailed {
        session: SessionId,
        message: String,
    },
    AlertHistoryLoaded {
        records: Vec<AlertRecord>,
    },
    /// A freshly raised alert (threshold breach, state change)
    AlertRaised {
        record: AlertRecord,
    },
    Notice {
        level: NoticeLevel,
        text: String,
    },
}

#[derive(Clone, Debug)]
pub struct EventEnvelope {
    pub seq: u64,
    pub at: SystemTime,
    pub event: DashboardEvent,
}

/// True when the event is scoped to a session other than the current
/// one. Such events come from a superseded session whose tasks were
/// already aborted but whose messages were still in flight.
fn is_stale(state: &DashboardState, event: &DashboardEvent) -> bool {
    let session = match event {
        DashboardEvent::LogLine { session, .. }
        | DashboardEvent::LogStreamFailed { session, .. }
        | DashboardEvent::StatsTick { session, .. }
        | DashboardEvent::StatsError { session, .. }
        | DashboardEvent::VolumePending { session }
        | DashboardEvent::VolumeLoaded { session, .. }
        | DashboardEvent::VolumeFailed { session, .. } => session,
        _ => return false,
    };
    !state.session_is_current(session)
}

pub fn reduce(state: &mut DashboardState, env: &EventEnvelope) {
    state.last_seq = env.seq;

    if is_stale(state, &env.event) {
        return;
    }

    match &env.event {
        DashboardEvent::ContainersLoaded { containers } => {
            state.containers = containers.clone();
        }
        DashboardEvent::LogLine { text, .. } => {
            state.logs.push(text.clone());
        }
        DashboardEvent::LogStreamFailed { message, .. } => {
            state.push_notice(NoticeLevel::Error, format!("log stream: {}", message));
        }
        DashboardEvent::StatsTick { label, sample, .. } => {
            state.charts.push_sample(label, sample);
        }
        DashboardEvent::StatsError { message, .. } => {
            if let Some(sel) = state.selection.as_mut() {
                sel.stats_error_seen = true;
            }
            if !message.is_empty() {
                state.push_notice(NoticeLevel::Info, format!("stats unavailable: {}", message));
            }
        }
        DashboardEvent::VolumePending { .. } => {
            if let Some(sel) = state.selection.as_mut() {
                sel.volume = VolumeState::Pending;
            }
        }
        DashboardEvent::VolumeLoaded { usage, .. } => {
            if let Some(sel) = state.selection.as_mut() {
                sel.volume = VolumeState::Ready(usage.clone());
            }
        }
        DashboardEvent::VolumeFailed { message, .. } => {
            if let Some(sel) = state.selection.as_mut() {
                sel.volume = VolumeState::Failed(message.clone());
            }
        }
        DashboardEvent::AlertHistoryLoaded { records } => {
            state.alerts = records.clone();
        }
        DashboardEvent::AlertRaised { record } => {
            state.alerts.insert(0, record.clone());
            state.push_notice(
                NoticeLevel::Error,
                format!("[{}] {}: {}", record.level, record.container, record.message),
            );
        }
        DashboardEvent::Notice { level, text } => {
            state.push_notice(*level, text.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertLevel;

    fn envelope(seq: u64, event: DashboardEvent) -> EventEnvelope {
        EventEnvelope {
            seq,
            at: SystemTime::now(),
            event,
        }
    }

    fn running_container(name: &str) -> ContainerSummary {
        ContainerSummary {
            id: format!("{}-0123456789abcdef", name),
            name: name.into(),
            image: "nginx:latest".into(),
            status: "Up 2 hours".into(),
            state: "running".into(),
            uptime: "2h".into(),
            ports: vec![],
        }
    }

    #[test]
    fn test_log_lines_append_in_order() {
        let mut state = DashboardState::new();
        state.begin_selection("s1".into(), running_container("api"));

        for (i, text) in ["first", "second", "third"].iter().enumerate() {
            reduce(
                &mut state,
                &envelope(
                    i as u64,
                    DashboardEvent::LogLine {
                        session: "s1".into(),
                        text: text.to_string(),
                    },
                ),
            );
        }
        assert_eq!(
            state.logs.iter().collect::<Vec<_>>(),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_stale_session_events_dropped() {
        let mut state = DashboardState::new();
        state.begin_selection("s1".into(), running_container("a"));
        reduce(
            &mut state,
            &envelope(
                1,
                DashboardEvent::LogLine {
                    session: "s1".into(),
                    text: "from a".into(),
                },
            ),
        );

        // Re-select: a message from the superseded session is in flight.
        state.begin_selection("s2".into(), running_container("b"));
        reduce(
            &mut state,
            &envelope(
                2,
                DashboardEvent::LogLine {
                    session: "s1".into(),
                    text: "late straggler".into(),
                },
            ),
        );
        assert!(state.logs.is_empty());

        reduce(
            &mut state,
            &envelope(
                3,
                DashboardEvent::StatsError {
                    session: "s1".into(),
                    message: "gone".into(),
                },
            ),
        );
        assert!(!state.selection.as_ref().unwrap().stats_error_seen);

        reduce(
            &mut state,
            &envelope(
                4,
                DashboardEvent::LogLine {
                    session: "s2".into(),
                    text: "from b".into(),
                },
            ),
        );
        assert_eq!(state.logs.iter().collect::<Vec<_>>(), vec!["from b"]);
    }

    #[test]
    fn test_stats_error_shows_overlay() {
        let mut state = DashboardState::new();
        state.begin_selection("s1".into(), running_container("api"));
        assert!(!state.overlay_visible());

        reduce(
            &mut state,
            &envelope(
                1,
                DashboardEvent::StatsError {
                    session: "s1".into(),
                    message: "container stopped".into(),
                },
            ),
        );
        assert!(state.overlay_visible());
    }

    #[test]
    fn test_stats_tick_feeds_all_charts() {
        let mut state = DashboardState::new();
        state.begin_selection("s1".into(), running_container("api"));

        reduce(
            &mut state,
            &envelope(
                1,
                DashboardEvent::StatsTick {
                    session: "s1".into(),
                    label: "10:00:00".into(),
                    sample: StatsSample {
                        cpu_pct: 12.0,
                        mem_used_mb: 64.0,
                        mem_limit_mb: 512.0,
                        net_rx_mb: 1.0,
                        net_tx_mb: 2.0,
                        disk_read_mb: 3.0,
                        disk_write_mb: 4.0,
                    },
                },
            ),
        );
        assert_eq!(state.charts.cpu.latest(0), Some(12.0));
        assert_eq!(state.charts.net.latest(1), Some(2.0));
        assert_eq!(state.charts.disk.latest(0), Some(3.0));
    }

    #[test]
    fn test_alert_raised_prepends() {
        let mut state = DashboardState::new();
        state.alerts.push(AlertRecord {
            timestamp: "2024-03-01T09:00:00".into(),
            level: AlertLevel::Info,
            container: "api".into(),
            message: "older".into(),
        });

        reduce(
            &mut state,
            &envelope(
                1,
                DashboardEvent::AlertRaised {
                    record: AlertRecord {
                        timestamp: "2024-03-01T10:00:00".into(),
                        level: AlertLevel::High,
                        container: "api".into(),
                        message: "CPU usage 95.0% exceeds limit 80%".into(),
                    },
                },
            ),
        );
        assert_eq!(state.alerts.len(), 2);
        assert_eq!(state.alerts[0].message, "CPU usage 95.0% exceeds limit 80%");
        assert!(!state.notices.is_empty());
    }

    #[test]
    fn test_volume_lifecycle() {
        let mut state = DashboardState::new();
        state.begin_selection("s1".into(), running_container("api"));

        reduce(
            &mut state,
            &envelope(1, DashboardEvent::VolumePending { session: "s1".into() }),
        );
        assert_eq!(
            state.selection.as_ref().unwrap().volume,
            VolumeState::Pending
        );

        reduce(
            &mut state,
            &envelope(
                2,
                DashboardEvent::VolumeLoaded {
                    session: "s1".into(),
                    usage: VolumeUsage::Stopped,
                },
            ),
        );
        assert_eq!(
            state.selection.as_ref().unwrap().volume,
            VolumeState::Ready(VolumeUsage::Stopped)
        );
    }
}
