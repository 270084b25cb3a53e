use serde::{Deserialize, Serialize};

pub type ContainerId = String;

/// Immutable snapshot of one container row as delivered by the backend.
/// The dashboard never mutates these; selection and classification only
/// read attributes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Full container id
    pub id: ContainerId,
    /// Display name (leading slash already stripped)
    pub name: String,
    /// Image reference, e.g. "nginx:latest"
    pub image: String,
    /// Human status text, e.g. "Up 2 hours" or "Exited (0) 3 minutes ago"
    pub status: String,
    /// Raw state, e.g. "running" / "exited"
    pub state: String,
    /// Uptime fragment for the details row, "—" when not running
    pub uptime: String,
    /// Rendered port mappings, e.g. "0.0.0.0:8080->80/tcp"
    pub ports: Vec<String>,
}

impl ContainerSummary {
    /// 12-character short form of the id
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(12);
        &self.id[..end]
    }

    pub fn ports_text(&self) -> String {
        self.ports.join(", ")
    }

    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Two-state classification that drives the stats overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }
}

/// Classify a container from its declared status string plus whether a
/// stats error has been observed since selection.
///
/// Running iff the status contains "up" (case-insensitive) and the stats
/// stream has not errored. The status string alone is authoritative at
/// selection time, so an already-stopped container classifies as Stopped
/// before any stats message arrives.
pub fn classify(status: &str, stats_error_seen: bool) -> ContainerState {
    if stats_error_seen {
        return ContainerState::Stopped;
    }
    if status.to_lowercase().contains("up") {
        ContainerState::Running
    } else {
        ContainerState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_running() {
        assert_eq!(classify("Up 2 hours", false), ContainerState::Running);
        assert_eq!(classify("Up About a minute", false), ContainerState::Running);
        assert_eq!(classify("UP 10 seconds", false), ContainerState::Running);
    }

    #[test]
    fn test_classify_stopped() {
        assert_eq!(
            classify("Exited (0) 3 minutes ago", false),
            ContainerState::Stopped
        );
        assert_eq!(classify("Created", false), ContainerState::Stopped);
        assert_eq!(classify("", false), ContainerState::Stopped);
    }

    #[test]
    fn test_stats_error_overrides_status() {
        assert_eq!(classify("Up 2 hours", true), ContainerState::Stopped);
    }

    #[test]
    fn test_short_id() {
        let c = ContainerSummary {
            id: "0123456789abcdef0123".into(),
            name: "api".into(),
            image: "nginx:latest".into(),
            status: "Up 2 hours".into(),
            state: "running".into(),
            uptime: "2h".into(),
            ports: vec![],
        };
        assert_eq!(c.short_id(), "0123456789ab");

        let short = ContainerSummary { id: "abc".into(), ..c };
        assert_eq!(short.short_id(), "abc");
    }
}
