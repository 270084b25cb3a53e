use crate::alert::AlertRecord;
use crate::model::ContainerSummary;

/// Display cap for the system-wide events table.
pub const SYSTEM_EVENTS_CAP: usize = 50;
/// Display cap for the per-container alerts table.
pub const CONTAINER_ALERTS_CAP: usize = 20;

/// Case-insensitive substring search over buffered log lines. Hiding
/// only: the buffer itself is never touched, so clearing the query
/// restores the full history in original order.
#[derive(Clone, Debug, Default)]
pub struct LogSearch {
    pub query: String,
}

impl LogSearch {
    pub fn matches(&self, line: &str) -> bool {
        self.query.is_empty() || line.to_lowercase().contains(&self.query.to_lowercase())
    }

    pub fn set(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn clear(&mut self) {
        self.query.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }
}

/// Status chip of the container list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusChip {
    #[default]
    All,
    Running,
    Exited,
}

impl StatusChip {
    pub fn cycle(self) -> Self {
        match self {
            Self::All => Self::Running,
            Self::Running => Self::Exited,
            Self::Exited => Self::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Running => "RUNNING",
            Self::Exited => "EXITED",
        }
    }

    pub fn matches(&self, state: &str) -> bool {
        match self {
            Self::All => true,
            Self::Running => state.eq_ignore_ascii_case("running"),
            Self::Exited => !state.eq_ignore_ascii_case("running"),
        }
    }
}

/// Container-list predicate: status chip AND free-text query across
/// name, image, and ports.
#[derive(Clone, Debug, Default)]
pub struct ContainerFilter {
    pub status: StatusChip,
    pub query: String,
}

impl ContainerFilter {
    pub fn matches(&self, c: &ContainerSummary) -> bool {
        if !self.status.matches(&c.state) {
            return false;
        }
        if self.query.is_empty() {
            return true;
        }
        let q = self.query.to_lowercase();
        c.name.to_lowercase().contains(&q)
            || c.image.to_lowercase().contains(&q)
            || c.ports_text().to_lowercase().contains(&q)
    }
}

/// Date-prefix filter over the raw timestamp string of alert/event
/// records. Prefix is `YYYY-MM-DD` as typed; empty shows everything.
#[derive(Clone, Debug, Default)]
pub struct DateFilter {
    pub prefix: String,
}

impl DateFilter {
    pub fn matches(&self, record: &AlertRecord) -> bool {
        self.prefix.is_empty() || record.timestamp.starts_with(&self.prefix)
    }
}

/// Records visible for one events/alerts table: date filter applied over
/// the buffered set (most-recent-first), then capped for display. The
/// cap bounds rendering, not fetching.
pub fn visible_records<'a>(
    records: &'a [AlertRecord],
    filter: &DateFilter,
    cap: usize,
) -> Vec<&'a AlertRecord> {
    records
        .iter()
        .filter(|r| filter.matches(r))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertLevel;

    fn container(name: &str, image: &str, state: &str, ports: &[&str]) -> ContainerSummary {
        ContainerSummary {
            id: format!("{}-id", name),
            name: name.into(),
            image: image.into(),
            status: String::new(),
            state: state.into(),
            uptime: "—".into(),
            ports: ports.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn record(ts: &str) -> AlertRecord {
        AlertRecord {
            timestamp: ts.into(),
            level: AlertLevel::Info,
            container: "api".into(),
            message: "msg".into(),
        }
    }

    #[test]
    fn test_log_search() {
        let mut search = LogSearch::default();
        assert!(search.matches("anything at all"));

        search.set("Error");
        assert!(search.matches("connection error: refused"));
        assert!(search.matches("ERROR again"));
        assert!(!search.matches("all good"));

        search.clear();
        assert!(search.matches("all good"));
    }

    #[test]
    fn test_status_chip_cycle() {
        let chip = StatusChip::All;
        assert_eq!(chip.cycle(), StatusChip::Running);
        assert_eq!(chip.cycle().cycle(), StatusChip::Exited);
        assert_eq!(chip.cycle().cycle().cycle(), StatusChip::All);
    }

    #[test]
    fn test_container_filter_combines_status_and_query() {
        let web = container("web", "nginx:latest", "running", &["0.0.0.0:8080->80/tcp"]);
        let db = container("db", "postgres:16", "exited", &[]);

        let mut f = ContainerFilter::default();
        assert!(f.matches(&web));
        assert!(f.matches(&db));

        f.status = StatusChip::Running;
        assert!(f.matches(&web));
        assert!(!f.matches(&db));

        f.query = "postgres".into();
        assert!(!f.matches(&web));
        assert!(!f.matches(&db)); // status AND query must both hold

        f.status = StatusChip::Exited;
        assert!(f.matches(&db));
    }

    #[test]
    fn test_container_filter_matches_ports() {
        let web = container("web", "nginx:latest", "running", &["0.0.0.0:8080->80/tcp"]);
        let f = ContainerFilter {
            status: StatusChip::All,
            query: "8080".into(),
        };
        assert!(f.matches(&web));
    }

    #[test]
    fn test_date_prefix() {
        let r = record("2024-03-01T10:00:00");
        let on = DateFilter {
            prefix: "2024-03-01".into(),
        };
        let off = DateFilter {
            prefix: "2024-03-02".into(),
        };
        let none = DateFilter::default();
        assert!(on.matches(&r));
        assert!(!off.matches(&r));
        assert!(none.matches(&r));
    }

    #[test]
    fn test_display_caps() {
        let records: Vec<AlertRecord> = (0..73)
            .map(|i| record(&format!("2024-03-01T10:{:02}:00", 72 - i)))
            .collect();
        let filter = DateFilter {
            prefix: "2024-03-01".into(),
        };

        let events = visible_records(&records, &filter, SYSTEM_EVENTS_CAP);
        assert_eq!(events.len(), 50);
        // Most recent first: the head of the buffered set survives the cap.
        assert_eq!(events[0].timestamp, records[0].timestamp);

        let alerts = visible_records(&records, &filter, CONTAINER_ALERTS_CAP);
        assert_eq!(alerts.len(), 20);
    }

    #[test]
    fn test_filter_is_nondestructive() {
        let records: Vec<AlertRecord> = vec![
            record("2024-03-01T10:00:00"),
            record("2024-03-02T10:00:00"),
            record("2024-03-01T11:00:00"),
        ];
        let filter = DateFilter {
            prefix: "2024-03-01".into(),
        };
        let filtered = visible_records(&records, &filter, SYSTEM_EVENTS_CAP);
        assert_eq!(filtered.len(), 2);

        // Clearing the filter reproduces the full set in original order.
        let all = visible_records(&records, &DateFilter::default(), SYSTEM_EVENTS_CAP);
        let original: Vec<&AlertRecord> = records.iter().collect();
        assert_eq!(
            all.iter().map(|r| &r.timestamp).collect::<Vec<_>>(),
            original.iter().map(|r| &r.timestamp).collect::<Vec<_>>()
        );
    }
}
