use std::collections::VecDeque;
use std::time::Instant;

use crate::alert::AlertRecord;
use crate::backend::VolumeUsage;
use crate::model::{classify, ContainerState, ContainerSummary};
use crate::series::{ChartSet, CHART_WINDOW};

/// Opaque token identifying one stream session. Events tagged with a
/// superseded token are dropped by the reducer.
pub type SessionId = String;

/// Default capacity of the per-selection log buffer.
pub const LOG_CAPACITY: usize = 2000;

/// Rolling buffer of log lines for the current selection. Render order
/// equals arrival order; oldest lines are evicted past capacity.
#[derive(Debug)]
pub struct LogStore {
    cap: usize,
    lines: VecDeque<String>,
}

impl LogStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            lines: VecDeque::new(),
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.cap {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Volume usage fetch state for the stats panel.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum VolumeState {
    #[default]
    NotFetched,
    Pending,
    Ready(VolumeUsage),
    Failed(String),
}

/// The currently selected container and everything scoped to it.
#[derive(Clone, Debug)]
pub struct Selection {
    pub session: SessionId,
    pub container: ContainerSummary,
    /// Set once the stats subscription delivers an error payload or
    /// fails; sticky until the next selection.
    pub stats_error_seen: bool,
    pub volume: VolumeState,
}

impl Selection {
    pub fn classification(&self) -> ContainerState {
        classify(&self.container.status, self.stats_error_seen)
    }
}

/// Severity of a transient notice shown in the footer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub at: Instant,
}

/// All state the dashboard renders from. One reducer task mutates it;
/// the TUI loop reads snapshots.
#[derive(Debug)]
pub struct DashboardState {
    pub containers: Vec<ContainerSummary>,
    pub selection: Option<Selection>,
    pub logs: LogStore,
    pub charts: ChartSet,
    /// Cached alert/event history, most recent first
    pub alerts: Vec<AlertRecord>,
    pub notices: VecDeque<Notice>,
    pub last_seq: u64,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::with_capacities(LOG_CAPACITY, CHART_WINDOW)
    }

    pub fn with_capacities(log_cap: usize, chart_cap: usize) -> Self {
        Self {
            containers: Vec::new(),
            selection: None,
            logs: LogStore::new(log_cap),
            charts: ChartSet::new(chart_cap),
            alerts: Vec::new(),
            notices: VecDeque::new(),
            last_seq: 0,
        }
    }

    /// Install a new selection: clears the log buffer, resets (does not
    /// rebuild) the chart buffers, and arms the session token that
    /// subsequent stream events must carry.
    pub fn begin_selection(&mut self, session: SessionId, container: ContainerSummary) {
        self.logs.clear();
        self.charts.reset();
        self.selection = Some(Selection {
            session,
            container,
            stats_error_seen: false,
            volume: VolumeState::NotFetched,
        });
    }

    /// Drop the selection (navigating away). Buffers clear with it.
    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.logs.clear();
        self.charts.reset();
    }

    pub fn current_session(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.session.as_str())
    }

    /// True when an event tagged with `session` belongs to the current
    /// selection.
    pub fn session_is_current(&self, session: &str) -> bool {
        self.current_session() == Some(session)
    }

    /// The stats-unavailable overlay is visible whenever the selected
    /// container classifies as stopped.
    pub fn overlay_visible(&self) -> bool {
        self.selection
            .as_ref()
            .map(|s| !s.classification().is_running())
            .unwrap_or(false)
    }

    pub fn push_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push_back(Notice {
            level,
            text: text.into(),
            at: Instant::now(),
        });
        while self.notices.len() > 8 {
            self.notices.pop_front();
        }
    }

    /// Drop notices older than `ttl_secs`.
    pub fn prune_notices(&mut self, ttl_secs: u64) {
        let now = Instant::now();
        self.notices
            .retain(|n| now.duration_since(n.at).as_secs() < ttl_secs);
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str, status: &str, state: &str) -> ContainerSummary {
        ContainerSummary {
            id: format!("{}-0123456789abcdef", name),
            name: name.into(),
            image: "nginx:latest".into(),
            status: status.into(),
            state: state.into(),
            uptime: "—".into(),
            ports: vec![],
        }
    }

    #[test]
    fn test_log_store_evicts_oldest() {
        let mut logs = LogStore::new(3);
        for i in 0..5 {
            logs.push(format!("line {}", i));
        }
        assert_eq!(logs.len(), 3);
        assert_eq!(
            logs.iter().collect::<Vec<_>>(),
            vec!["line 2", "line 3", "line 4"]
        );
    }

    #[test]
    fn test_begin_selection_resets_buffers() {
        let mut state = DashboardState::new();
        state.logs.push("old".into());
        state.charts.cpu.push("t", &[1.0]);

        state.begin_selection("s1".into(), container("api", "Up 2 hours", "running"));
        assert!(state.logs.is_empty());
        assert!(state.charts.cpu.is_empty());
        assert!(state.session_is_current("s1"));
        assert!(!state.session_is_current("s0"));
    }

    #[test]
    fn test_overlay_for_stopped_selection() {
        let mut state = DashboardState::new();
        assert!(!state.overlay_visible());

        state.begin_selection(
            "s1".into(),
            container("db", "Exited (0) 3 minutes ago", "exited"),
        );
        assert!(state.overlay_visible());

        state.begin_selection("s2".into(), container("api", "Up 2 hours", "running"));
        assert!(!state.overlay_visible());

        state.selection.as_mut().unwrap().stats_error_seen = true;
        assert!(state.overlay_visible());
    }
}
