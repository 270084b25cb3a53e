mod backends;
mod session;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Chart, Clear, Dataset, GraphType, List, ListItem, ListState,
        Paragraph, Wrap,
    },
    Terminal,
};
use tokio::sync::{mpsc, RwLock};

use wharf_core::alert::AlertConfig;
use wharf_core::backend::{
    AlertTestOutcome, Backend, ImageLayer, ImageSummary, SystemOverview, VolumeUsage,
};
use wharf_core::config::{ThemeChoice, WharfConfig};
use wharf_core::filter::{
    visible_records, ContainerFilter, DateFilter, LogSearch, CONTAINER_ALERTS_CAP,
    SYSTEM_EVENTS_CAP,
};
use wharf_core::model::ContainerSummary;
use wharf_core::reducer::{reduce, DashboardEvent};
use wharf_core::state::{DashboardState, NoticeLevel, VolumeState};

use backends::{DockerBackend, FakeBackend};
use session::{next_session_id, spawn_volume_fetch, EventBus, StreamSession};
use ui::theme::Theme;

#[derive(Parser)]
#[command(name = "wharf")]
#[command(about = "Live dashboard for Docker containers", long_about = None)]
struct Cli {
    /// Use the scripted demo backend instead of the Docker daemon
    #[arg(long)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the dashboard (default)
    Tui,
    /// Print the container table once
    Ls,
    /// Stream one container's logs to stdout
    Logs {
        container: String,
        #[arg(short, long, default_value = "true")]
        follow: bool,
    },
    /// Pull an image, printing progress
    Pull { image: String },
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

async fn make_backend(demo: bool, config: &WharfConfig) -> Arc<dyn Backend> {
    if demo {
        return Arc::new(FakeBackend::new());
    }
    match DockerBackend::connect(config.alerts.clone(), config.alert_history).await {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            eprintln!("{}; running with the demo backend", e);
            Arc::new(FakeBackend::new())
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().unwrap_or_default();
    let (config_path, loaded) = WharfConfig::discover(&cwd);
    let config = match loaded {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Error loading {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
        None => WharfConfig::default(),
    };

    match cli.command {
        Some(Commands::Ls) => run_cli_ls(cli.demo, &config).await,
        Some(Commands::Logs { container, follow }) => {
            run_cli_logs(cli.demo, &config, &container, follow).await
        }
        Some(Commands::Pull { image }) => run_cli_pull(cli.demo, &config, &image).await,
        Some(Commands::Tui) | None => run_tui(cli.demo, config, config_path).await,
    }
}

async fn resolve_container(
    backend: &Arc<dyn Backend>,
    needle: &str,
) -> Result<ContainerSummary, String> {
    let containers = backend
        .list_containers()
        .await
        .map_err(|e| e.to_string())?;
    containers
        .iter()
        .find(|c| c.name == needle || c.id.starts_with(needle))
        .cloned()
        .ok_or_else(|| {
            let names: Vec<&str> = containers.iter().map(|c| c.name.as_str()).collect();
            format!("unknown container '{}'. Available: {}", needle, names.join(", "))
        })
}

async fn run_cli_ls(demo: bool, config: &WharfConfig) -> io::Result<()> {
    let backend = make_backend(demo, config).await;
    match backend.list_containers().await {
        Ok(containers) => {
            println!(
                "{:<14} {:<24} {:<32} {:<24} {}",
                "ID", "NAME", "IMAGE", "STATUS", "PORTS"
            );
            for c in containers {
                println!(
                    "{:<14} {:<24} {:<32} {:<24} {}",
                    c.short_id(),
                    c.name,
                    c.image,
                    c.status,
                    c.ports_text()
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_cli_logs(
    demo: bool,
    config: &WharfConfig,
    container: &str,
    follow: bool,
) -> io::Result<()> {
    let backend = make_backend(demo, config).await;
    let target = match resolve_container(&backend, container).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut rx = match backend.open_log_stream(&target.id).await {
        Ok(rx) => rx,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if follow {
        eprintln!("Streaming logs for '{}'... (Ctrl+C to stop)", target.name);
    }
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            item = rx.recv() => {
                match item {
                    Some(Ok(line)) => println!("{}", line),
                    Some(Err(e)) => {
                        eprintln!("log stream: {}", e);
                        break;
                    }
                    None => break,
                }
                // Without follow, stop once the stream goes quiet.
                if !follow {
                    while let Ok(Some(item)) =
                        tokio::time::timeout(Duration::from_millis(400), rx.recv()).await
                    {
                        match item {
                            Ok(line) => println!("{}", line),
                            Err(e) => {
                                eprintln!("log stream: {}", e);
                                break;
                            }
                        }
                    }
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn run_cli_pull(demo: bool, config: &WharfConfig, image: &str) -> io::Result<()> {
    let backend = make_backend(demo, config).await;
    let mut rx = match backend.pull_image(image).await {
        Ok(rx) => rx,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut failed = false;
    while let Some(progress) = rx.recv().await {
        if let Some(error) = progress.error {
            eprintln!("Error: {}", error);
            failed = true;
            break;
        }
        let status = progress.status.unwrap_or_default();
        match progress.progress {
            Some(bar) => println!("{} {}", status, bar),
            None => println!("{}", status),
        }
    }
    if failed {
        std::process::exit(1);
    }
    println!("Pull complete.");
    Ok(())
}

// ─────────────────────────── TUI ───────────────────────────

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum View {
    #[default]
    Dashboard,
    Alerts,
    Images,
    System,
}

impl View {
    fn label(&self) -> &'static str {
        match self {
            View::Dashboard => "Dashboard",
            View::Alerts => "Alerts",
            View::Images => "Images",
            View::System => "System",
        }
    }

    fn all() -> [View; 4] {
        [View::Dashboard, View::Alerts, View::Images, View::System]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum InputMode {
    #[default]
    Normal,
    LogSearch,
    ContainerSearch,
    ImageSearch,
    AlertsDate,
    EventsDate,
    PullImage,
    EditField,
}

impl InputMode {
    fn prompt(&self) -> &'static str {
        match self {
            InputMode::Normal => "",
            InputMode::LogSearch => "log search",
            InputMode::ContainerSearch => "container search",
            InputMode::ImageSearch => "image search",
            InputMode::AlertsDate | InputMode::EventsDate => "date (YYYY-MM-DD)",
            InputMode::PullImage => "image to pull",
            InputMode::EditField => "value",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SettingsField {
    CpuLimit,
    MemLimit,
    SlackUrl,
    SlackEnabled,
    DiscordUrl,
    DiscordEnabled,
    TelegramToken,
    TelegramChat,
    TelegramEnabled,
    GenericUrl,
    GenericEnabled,
    Theme,
}

const SETTINGS_FIELDS: [SettingsField; 12] = [
    SettingsField::CpuLimit,
    SettingsField::MemLimit,
    SettingsField::SlackUrl,
    SettingsField::SlackEnabled,
    SettingsField::DiscordUrl,
    SettingsField::DiscordEnabled,
    SettingsField::TelegramToken,
    SettingsField::TelegramChat,
    SettingsField::TelegramEnabled,
    SettingsField::GenericUrl,
    SettingsField::GenericEnabled,
    SettingsField::Theme,
];

impl SettingsField {
    fn label(&self) -> &'static str {
        match self {
            SettingsField::CpuLimit => "CPU limit %",
            SettingsField::MemLimit => "Memory limit %",
            SettingsField::SlackUrl => "Slack webhook",
            SettingsField::SlackEnabled => "Slack enabled",
            SettingsField::DiscordUrl => "Discord webhook",
            SettingsField::DiscordEnabled => "Discord enabled",
            SettingsField::TelegramToken => "Telegram bot token",
            SettingsField::TelegramChat => "Telegram chat id",
            SettingsField::TelegramEnabled => "Telegram enabled",
            SettingsField::GenericUrl => "Generic webhook",
            SettingsField::GenericEnabled => "Generic enabled",
            SettingsField::Theme => "Theme",
        }
    }

    fn is_toggle(&self) -> bool {
        matches!(
            self,
            SettingsField::SlackEnabled
                | SettingsField::DiscordEnabled
                | SettingsField::TelegramEnabled
                | SettingsField::GenericEnabled
                | SettingsField::Theme
        )
    }
}

#[derive(Clone, Debug)]
struct SettingsForm {
    config: AlertConfig,
    theme: ThemeChoice,
    cursor: usize,
}

impl SettingsForm {
    fn new(config: AlertConfig, theme: ThemeChoice) -> Self {
        Self {
            config,
            theme,
            cursor: 0,
        }
    }

    fn field(&self) -> SettingsField {
        SETTINGS_FIELDS[self.cursor]
    }

    fn value_text(&self, field: SettingsField) -> String {
        let on_off = |b: bool| if b { "on" } else { "off" }.to_string();
        match field {
            SettingsField::CpuLimit => self.config.cpu_limit.to_string(),
            SettingsField::MemLimit => self.config.mem_limit.to_string(),
            SettingsField::SlackUrl => self.config.slack_webhook.clone(),
            SettingsField::SlackEnabled => on_off(self.config.slack_enabled),
            SettingsField::DiscordUrl => self.config.discord_webhook.clone(),
            SettingsField::DiscordEnabled => on_off(self.config.discord_enabled),
            SettingsField::TelegramToken => self.config.telegram_bot_token.clone(),
            SettingsField::TelegramChat => self.config.telegram_chat_id.clone(),
            SettingsField::TelegramEnabled => on_off(self.config.telegram_enabled),
            SettingsField::GenericUrl => self.config.generic_webhook.clone(),
            SettingsField::GenericEnabled => on_off(self.config.generic_enabled),
            SettingsField::Theme => self.theme.label().to_string(),
        }
    }

    fn apply_text(&mut self, field: SettingsField, input: &str) -> Result<(), String> {
        let input = input.trim();
        match field {
            SettingsField::CpuLimit => {
                self.config.cpu_limit =
                    input.parse().map_err(|_| "CPU limit must be a number".to_string())?;
            }
            SettingsField::MemLimit => {
                self.config.mem_limit = input
                    .parse()
                    .map_err(|_| "Memory limit must be a number".to_string())?;
            }
            SettingsField::SlackUrl => self.config.slack_webhook = input.to_string(),
            SettingsField::DiscordUrl => self.config.discord_webhook = input.to_string(),
            SettingsField::TelegramToken => self.config.telegram_bot_token = input.to_string(),
            SettingsField::TelegramChat => self.config.telegram_chat_id = input.to_string(),
            SettingsField::GenericUrl => self.config.generic_webhook = input.to_string(),
            _ => {}
        }
        Ok(())
    }

    fn toggle(&mut self) {
        match self.field() {
            SettingsField::SlackEnabled => self.config.slack_enabled = !self.config.slack_enabled,
            SettingsField::DiscordEnabled => {
                self.config.discord_enabled = !self.config.discord_enabled
            }
            SettingsField::TelegramEnabled => {
                self.config.telegram_enabled = !self.config.telegram_enabled
            }
            SettingsField::GenericEnabled => {
                self.config.generic_enabled = !self.config.generic_enabled
            }
            SettingsField::Theme => self.theme = self.theme.cycle(),
            _ => {}
        }
    }
}

/// Results of view-local one-shot requests, delivered back to the TUI
/// loop without touching the shared dashboard state.
enum UiMsg {
    Images(Result<Vec<ImageSummary>, String>),
    ImageHistory(Result<Vec<ImageLayer>, String>),
    Scan(Result<String, String>),
    PullLine(String),
    PullDone,
    Overview(Result<SystemOverview, String>),
    TestOutcome(Result<AlertTestOutcome, String>),
    ImageRemoved(Result<(), String>),
}

#[derive(Default)]
struct UiState {
    view: View,
    mode: InputMode,
    input: String,
    help_open: bool,

    container_filter: ContainerFilter,
    list_state: ListState,
    cursor: usize,

    log_search: LogSearch,
    autoscroll: bool,
    log_scroll: usize,
    stats_enabled: bool,

    alerts_date: DateFilter,
    events_date: DateFilter,

    images: Vec<ImageSummary>,
    images_loaded: bool,
    image_filter: String,
    image_state: ListState,
    image_cursor: usize,
    image_history: Option<Vec<ImageLayer>>,
    scan_text: Option<String>,
    pull_lines: Vec<String>,
    pending_delete: Option<String>,

    overview: Option<SystemOverview>,
    show_raw_version: bool,

    settings: Option<SettingsForm>,
}

fn visible_containers<'a>(
    containers: &'a [ContainerSummary],
    filter: &ContainerFilter,
) -> Vec<&'a ContainerSummary> {
    containers.iter().filter(|c| filter.matches(c)).collect()
}

fn visible_images<'a>(images: &'a [ImageSummary], query: &str) -> Vec<&'a ImageSummary> {
    let q = query.to_lowercase();
    images
        .iter()
        .filter(|img| {
            q.is_empty()
                || img.display_tag().to_lowercase().contains(&q)
                || img.id.to_lowercase().contains(&q)
        })
        .collect()
}

fn spawn_container_refresh(backend: Arc<dyn Backend>, bus: EventBus) {
    tokio::spawn(async move {
        match backend.list_containers().await {
            Ok(containers) => bus.emit(DashboardEvent::ContainersLoaded { containers }),
            Err(e) => bus.emit(DashboardEvent::Notice {
                level: NoticeLevel::Error,
                text: e.to_string(),
            }),
        }
    });
}

fn spawn_alert_history_fetch(backend: Arc<dyn Backend>, bus: EventBus) {
    tokio::spawn(async move {
        match backend.alert_history().await {
            Ok(records) => bus.emit(DashboardEvent::AlertHistoryLoaded { records }),
            Err(e) => bus.emit(DashboardEvent::Notice {
                level: NoticeLevel::Error,
                text: e.to_string(),
            }),
        }
    });
}

fn spawn_overview_fetch(backend: Arc<dyn Backend>, ui_tx: mpsc::UnboundedSender<UiMsg>) {
    tokio::spawn(async move {
        let result = backend
            .system_overview()
            .await
            .map_err(|e| e.to_string());
        let _ = ui_tx.send(UiMsg::Overview(result));
    });
}

fn spawn_images_fetch(backend: Arc<dyn Backend>, ui_tx: mpsc::UnboundedSender<UiMsg>) {
    tokio::spawn(async move {
        let result = backend.list_images().await.map_err(|e| e.to_string());
        let _ = ui_tx.send(UiMsg::Images(result));
    });
}

fn spawn_image_history_fetch(
    backend: Arc<dyn Backend>,
    id: String,
    ui_tx: mpsc::UnboundedSender<UiMsg>,
) {
    tokio::spawn(async move {
        let result = backend.image_history(&id).await.map_err(|e| e.to_string());
        let _ = ui_tx.send(UiMsg::ImageHistory(result));
    });
}

fn spawn_scan(backend: Arc<dyn Backend>, reference: String, ui_tx: mpsc::UnboundedSender<UiMsg>) {
    tokio::spawn(async move {
        let result = match backend.scan_image(&reference).await {
            Ok(report) => serde_json::to_string_pretty(&report).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let _ = ui_tx.send(UiMsg::Scan(result));
    });
}

fn spawn_pull(backend: Arc<dyn Backend>, reference: String, ui_tx: mpsc::UnboundedSender<UiMsg>) {
    tokio::spawn(async move {
        match backend.pull_image(&reference).await {
            Ok(mut rx) => {
                while let Some(progress) = rx.recv().await {
                    let line = if let Some(error) = progress.error {
                        format!("error: {}", error)
                    } else {
                        let status = progress.status.unwrap_or_default();
                        match progress.progress {
                            Some(bar) => format!("{} {}", status, bar),
                            None => status,
                        }
                    };
                    if ui_tx.send(UiMsg::PullLine(line)).is_err() {
                        return;
                    }
                }
                let _ = ui_tx.send(UiMsg::PullDone);
            }
            Err(e) => {
                let _ = ui_tx.send(UiMsg::PullLine(format!("error: {}", e)));
                let _ = ui_tx.send(UiMsg::PullDone);
            }
        }
    });
}

fn spawn_remove_image(
    backend: Arc<dyn Backend>,
    id: String,
    ui_tx: mpsc::UnboundedSender<UiMsg>,
) {
    tokio::spawn(async move {
        let result = backend.remove_image(&id).await.map_err(|e| e.to_string());
        let _ = ui_tx.send(UiMsg::ImageRemoved(result));
    });
}

fn spawn_test_alert(backend: Arc<dyn Backend>, ui_tx: mpsc::UnboundedSender<UiMsg>) {
    tokio::spawn(async move {
        let result = backend.send_test_alert().await.map_err(|e| e.to_string());
        let _ = ui_tx.send(UiMsg::TestOutcome(result));
    });
}

async fn run_tui(demo: bool, mut config: WharfConfig, config_path: PathBuf) -> io::Result<()> {
    let backend = make_backend(demo, &config).await;
    let bus = EventBus::new(1_000);
    let state = Arc::new(RwLock::new(DashboardState::with_capacities(
        config.log_capacity,
        config.chart_window,
    )));

    // Reducer task: the single consumer folding events into state.
    let state_for_reducer = state.clone();
    let mut reducer_rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match reducer_rx.recv().await {
                Ok(env) => {
                    let mut s = state_for_reducer.write().await;
                    reduce(&mut s, &env);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    spawn_container_refresh(backend.clone(), bus.clone());
    spawn_alert_history_fetch(backend.clone(), bus.clone());

    let mut terminal = setup_terminal()?;
    let res = tui_loop(&mut terminal, backend, bus, state, &mut config, &config_path).await;
    restore_terminal(terminal)?;
    res
}

async fn tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    backend: Arc<dyn Backend>,
    bus: EventBus,
    state: Arc<RwLock<DashboardState>>,
    config: &mut WharfConfig,
    config_path: &std::path::Path,
) -> io::Result<()> {
    let mut theme = Theme::from_choice(config.theme);
    let mut ui = UiState {
        autoscroll: true,
        stats_enabled: true,
        ..UiState::default()
    };
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiMsg>();
    let mut live_session: Option<StreamSession> = None;

    loop {
        // Drain view-local results before rendering.
        while let Ok(msg) = ui_rx.try_recv() {
            match msg {
                UiMsg::Images(Ok(images)) => {
                    ui.images = images;
                    ui.images_loaded = true;
                }
                UiMsg::Images(Err(e)) => notice(&bus, NoticeLevel::Error, e),
                UiMsg::ImageHistory(Ok(layers)) => ui.image_history = Some(layers),
                UiMsg::ImageHistory(Err(e)) => notice(&bus, NoticeLevel::Error, e),
                UiMsg::Scan(Ok(report)) => {
                    ui.scan_text = Some(report);
                    notice(&bus, NoticeLevel::Success, "scan complete");
                }
                UiMsg::Scan(Err(e)) => {
                    ui.scan_text = Some(e.clone());
                    notice(&bus, NoticeLevel::Error, e);
                }
                UiMsg::PullLine(line) => {
                    ui.pull_lines.push(line);
                    if ui.pull_lines.len() > 200 {
                        ui.pull_lines.remove(0);
                    }
                }
                UiMsg::PullDone => {
                    notice(&bus, NoticeLevel::Success, "image pull finished");
                    spawn_images_fetch(backend.clone(), ui_tx.clone());
                    spawn_container_refresh(backend.clone(), bus.clone());
                }
                UiMsg::Overview(Ok(overview)) => ui.overview = Some(overview),
                UiMsg::Overview(Err(e)) => notice(&bus, NoticeLevel::Error, e),
                UiMsg::TestOutcome(Ok(outcome)) => {
                    let level = if outcome.success {
                        NoticeLevel::Success
                    } else {
                        NoticeLevel::Error
                    };
                    notice(&bus, level, outcome.message);
                    spawn_alert_history_fetch(backend.clone(), bus.clone());
                }
                UiMsg::TestOutcome(Err(e)) => notice(&bus, NoticeLevel::Error, e),
                UiMsg::ImageRemoved(Ok(())) => {
                    notice(&bus, NoticeLevel::Success, "image deleted");
                    spawn_images_fetch(backend.clone(), ui_tx.clone());
                }
                UiMsg::ImageRemoved(Err(e)) => notice(&bus, NoticeLevel::Error, e),
            }
        }

        {
            let mut s = state.write().await;
            s.prune_notices(4);
        }

        {
            let snapshot = state.read().await;
            terminal.draw(|f| draw_app(f, &snapshot, &mut ui, &theme))?;
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };
        // Some terminals deliver press and release; act on presses only.
        if key.kind == event::KeyEventKind::Release {
            continue;
        }
        let KeyEvent { code, .. } = key;

        if ui.help_open {
            ui.help_open = false;
            continue;
        }

        // ---------- settings overlay ----------
        if ui.settings.is_some() {
            if ui.mode == InputMode::EditField {
                let _ = handle_input_key(&mut ui, code, &bus);
                continue;
            }
            let Some(form) = ui.settings.as_mut() else {
                continue;
            };
            match code {
                KeyCode::Esc => {
                    ui.settings = None;
                }
                KeyCode::Up => {
                    form.cursor = form.cursor.saturating_sub(1);
                }
                KeyCode::Down => {
                    form.cursor = (form.cursor + 1).min(SETTINGS_FIELDS.len() - 1);
                }
                KeyCode::Char(' ') => form.toggle(),
                KeyCode::Enter => {
                    let field = form.field();
                    if field.is_toggle() {
                        form.toggle();
                    } else {
                        ui.input = form.value_text(field);
                        ui.mode = InputMode::EditField;
                    }
                }
                KeyCode::Char('t') => spawn_test_alert(backend.clone(), ui_tx.clone()),
                KeyCode::Char('s') => {
                    // Overlay stays open so reverted channel flags are
                    // visible after a rejected enable.
                    save_settings(form, &backend, &bus, config, config_path, &mut theme).await;
                }
                _ => {}
            }
            continue;
        }

        // ---------- text input modes ----------
        if ui.mode != InputMode::Normal {
            if let Some(reference) = handle_input_key(&mut ui, code, &bus) {
                ui.pull_lines.clear();
                ui.pull_lines.push(format!("pulling {}...", reference));
                spawn_pull(backend.clone(), reference, ui_tx.clone());
            }
            continue;
        }

        // ---------- global keys ----------
        match code {
            KeyCode::Char('q') => {
                if let Some(mut session) = live_session.take() {
                    session.close();
                }
                return Ok(());
            }
            KeyCode::Char('?') => {
                ui.help_open = true;
                continue;
            }
            KeyCode::Char('o') => {
                // Both backends answer from memory, so the config GET is
                // safe to await inline.
                let alerts = match backend.alert_config().await {
                    Ok(alerts) => alerts,
                    Err(e) => {
                        notice(&bus, NoticeLevel::Error, e.to_string());
                        config.alerts.clone()
                    }
                };
                ui.settings = Some(SettingsForm::new(alerts, config.theme));
                continue;
            }
            KeyCode::Char('1') | KeyCode::Char('2') | KeyCode::Char('3') | KeyCode::Char('4') => {
                let target = match code {
                    KeyCode::Char('1') => View::Dashboard,
                    KeyCode::Char('2') => View::Alerts,
                    KeyCode::Char('3') => View::Images,
                    _ => View::System,
                };
                if target != ui.view {
                    // Leaving the dashboard cancels the live session; a
                    // superseded session never outlives its view.
                    if ui.view == View::Dashboard && target != View::Dashboard {
                        if let Some(mut session) = live_session.take() {
                            session.close();
                        }
                        state.write().await.clear_selection();
                    }
                    ui.view = target;
                    match target {
                        View::Dashboard => {
                            spawn_container_refresh(backend.clone(), bus.clone())
                        }
                        View::Alerts => spawn_alert_history_fetch(backend.clone(), bus.clone()),
                        View::Images => {
                            if !ui.images_loaded {
                                spawn_images_fetch(backend.clone(), ui_tx.clone());
                            }
                        }
                        View::System => {
                            spawn_overview_fetch(backend.clone(), ui_tx.clone());
                            spawn_alert_history_fetch(backend.clone(), bus.clone());
                        }
                    }
                }
                continue;
            }
            KeyCode::Char('R') => {
                match ui.view {
                    View::Dashboard => spawn_container_refresh(backend.clone(), bus.clone()),
                    View::Alerts => spawn_alert_history_fetch(backend.clone(), bus.clone()),
                    View::Images => spawn_images_fetch(backend.clone(), ui_tx.clone()),
                    View::System => {
                        spawn_overview_fetch(backend.clone(), ui_tx.clone());
                        spawn_alert_history_fetch(backend.clone(), bus.clone());
                    }
                }
                continue;
            }
            _ => {}
        }

        // ---------- view-specific keys ----------
        match ui.view {
            View::Dashboard => match code {
                KeyCode::Up => {
                    ui.cursor = ui.cursor.saturating_sub(1);
                }
                KeyCode::Down => {
                    ui.cursor += 1; // clamped at draw time
                }
                KeyCode::Enter => {
                    let chosen = {
                        let s = state.read().await;
                        visible_containers(&s.containers, &ui.container_filter)
                            .get(ui.cursor)
                            .map(|c| (*c).clone())
                    };
                    if let Some(container) = chosen {
                        // Close the previous pair before the new one
                        // opens, then arm the reducer with the new token.
                        if let Some(mut old) = live_session.take() {
                            old.close();
                        }
                        let sid = next_session_id();
                        {
                            let mut s = state.write().await;
                            s.begin_selection(sid.clone(), container.clone());
                        }
                        let session = StreamSession::open(
                            backend.clone(),
                            &container,
                            sid.clone(),
                            bus.clone(),
                            &config.alerts,
                        )
                        .await;
                        if ui.stats_enabled {
                            spawn_volume_fetch(
                                backend.clone(),
                                container.id.clone(),
                                sid,
                                bus.clone(),
                            );
                        }
                        live_session = Some(session);
                        ui.autoscroll = true;
                        ui.log_scroll = 0;
                    }
                }
                KeyCode::Char('f') => {
                    ui.container_filter.status = ui.container_filter.status.cycle();
                    ui.cursor = 0;
                }
                KeyCode::Char('c') => {
                    ui.mode = InputMode::ContainerSearch;
                    ui.input = ui.container_filter.query.clone();
                }
                KeyCode::Char('/') => {
                    ui.mode = InputMode::LogSearch;
                    ui.input = ui.log_search.query.clone();
                }
                KeyCode::Char('a') => {
                    ui.autoscroll = !ui.autoscroll;
                    if ui.autoscroll {
                        ui.log_scroll = 0;
                    }
                }
                KeyCode::Char('x') => {
                    state.write().await.logs.clear();
                }
                KeyCode::Char('s') => {
                    ui.stats_enabled = !ui.stats_enabled;
                }
                KeyCode::Char('e') => export_logs(&state, &bus, "txt").await,
                KeyCode::Char('E') => export_logs(&state, &bus, "json").await,
                KeyCode::PageUp => {
                    ui.autoscroll = false;
                    ui.log_scroll += 10;
                }
                KeyCode::PageDown => {
                    ui.log_scroll = ui.log_scroll.saturating_sub(10);
                    if ui.log_scroll == 0 {
                        ui.autoscroll = true;
                    }
                }
                _ => {}
            },
            View::Alerts => match code {
                KeyCode::Char('/') => {
                    ui.mode = InputMode::AlertsDate;
                    ui.input = ui.alerts_date.prefix.clone();
                }
                KeyCode::Char('t') => spawn_test_alert(backend.clone(), ui_tx.clone()),
                _ => {}
            },
            View::Images => match code {
                KeyCode::Up => {
                    ui.image_cursor = ui.image_cursor.saturating_sub(1);
                    ui.pending_delete = None;
                }
                KeyCode::Down => {
                    ui.image_cursor += 1;
                    ui.pending_delete = None;
                }
                KeyCode::Enter => {
                    let selected = visible_images(&ui.images, &ui.image_filter)
                        .get(ui.image_cursor)
                        .map(|img| img.id.clone());
                    if let Some(id) = selected {
                        ui.image_history = None;
                        ui.scan_text = None;
                        ui.pending_delete = None;
                        spawn_image_history_fetch(backend.clone(), id, ui_tx.clone());
                    }
                }
                KeyCode::Char('/') => {
                    ui.mode = InputMode::ImageSearch;
                    ui.input = ui.image_filter.clone();
                }
                KeyCode::Char('p') => {
                    ui.mode = InputMode::PullImage;
                    ui.input.clear();
                }
                KeyCode::Char('n') => {
                    let selected = visible_images(&ui.images, &ui.image_filter)
                        .get(ui.image_cursor)
                        .map(|img| img.id.clone());
                    if let Some(id) = selected {
                        ui.scan_text = Some("scanning... (this may take a while)".into());
                        spawn_scan(backend.clone(), id, ui_tx.clone());
                    }
                }
                KeyCode::Char('x') => {
                    let selected = visible_images(&ui.images, &ui.image_filter)
                        .get(ui.image_cursor)
                        .map(|img| img.id.clone());
                    if let Some(id) = selected {
                        if ui.pending_delete.as_deref() == Some(id.as_str()) {
                            ui.pending_delete = None;
                            spawn_remove_image(backend.clone(), id, ui_tx.clone());
                        } else {
                            ui.pending_delete = Some(id);
                            notice(
                                &bus,
                                NoticeLevel::Info,
                                "press x again to delete this image",
                            );
                        }
                    }
                }
                _ => {}
            },
            View::System => match code {
                KeyCode::Char('/') => {
                    ui.mode = InputMode::EventsDate;
                    ui.input = ui.events_date.prefix.clone();
                }
                KeyCode::Char('v') => {
                    ui.show_raw_version = !ui.show_raw_version;
                }
                _ => {}
            },
        }
    }
}

fn notice(bus: &EventBus, level: NoticeLevel, text: impl Into<String>) {
    bus.emit(DashboardEvent::Notice {
        level,
        text: text.into(),
    });
}

/// Shared text-input handling. Live filters apply per keystroke; the
/// pull prompt commits on Enter and hands the image reference back to
/// the caller.
fn handle_input_key(ui: &mut UiState, code: KeyCode, bus: &EventBus) -> Option<String> {
    let commit_on_enter = matches!(ui.mode, InputMode::PullImage | InputMode::EditField);
    match code {
        KeyCode::Esc => {
            ui.input.clear();
            ui.mode = InputMode::Normal;
            return None;
        }
        KeyCode::Enter => match ui.mode {
            InputMode::PullImage => {
                let reference = std::mem::take(&mut ui.input).trim().to_string();
                ui.mode = InputMode::Normal;
                return (!reference.is_empty()).then_some(reference);
            }
            InputMode::EditField => {
                let input = std::mem::take(&mut ui.input);
                if let Some(form) = ui.settings.as_mut() {
                    let field = form.field();
                    if let Err(e) = form.apply_text(field, &input) {
                        notice(bus, NoticeLevel::Error, e);
                    }
                }
                ui.mode = InputMode::Normal;
                return None;
            }
            _ => {
                ui.input.clear();
                ui.mode = InputMode::Normal;
                return None;
            }
        },
        KeyCode::Backspace => {
            ui.input.pop();
        }
        KeyCode::Char(c) => {
            ui.input.push(c);
        }
        _ => {}
    }
    if !commit_on_enter {
        let text = ui.input.clone();
        match ui.mode {
            InputMode::LogSearch => ui.log_search.set(text),
            InputMode::ContainerSearch => {
                ui.container_filter.query = text;
                ui.cursor = 0;
            }
            InputMode::ImageSearch => {
                ui.image_filter = text;
                ui.image_cursor = 0;
            }
            InputMode::AlertsDate => ui.alerts_date.prefix = text,
            InputMode::EventsDate => ui.events_date.prefix = text,
            _ => {}
        }
    }
    None
}

async fn save_settings(
    form: &mut SettingsForm,
    backend: &Arc<dyn Backend>,
    bus: &EventBus,
    config: &mut WharfConfig,
    config_path: &std::path::Path,
    theme: &mut Theme,
) {
    let limit_violations = form.config.validate_limits();
    if !limit_violations.is_empty() {
        for v in &limit_violations {
            notice(bus, NoticeLevel::Error, v.to_string());
        }
        return;
    }

    let mut candidate = form.config.clone();
    let channel_violations = candidate.sanitize_channels();
    for v in &channel_violations {
        notice(bus, NoticeLevel::Error, v.to_string());
    }
    // Reverted enabled flags stay visible in the form.
    form.config = candidate.clone();

    if let Err(e) = backend.save_alert_config(&candidate).await {
        notice(bus, NoticeLevel::Error, e.to_string());
        return;
    }
    config.alerts = candidate;
    config.theme = form.theme;
    *theme = Theme::from_choice(form.theme);
    match config.save(config_path) {
        Ok(()) => notice(bus, NoticeLevel::Success, "alert settings saved"),
        Err(e) => notice(
            bus,
            NoticeLevel::Error,
            format!("settings saved in-session, file write failed: {}", e),
        ),
    }
}

async fn export_logs(state: &Arc<RwLock<DashboardState>>, bus: &EventBus, format: &str) {
    let (lines, short_id) = {
        let s = state.read().await;
        let Some(selection) = s.selection.as_ref() else {
            notice(bus, NoticeLevel::Error, "no container selected");
            return;
        };
        (
            s.logs.iter().map(|l| l.to_string()).collect::<Vec<_>>(),
            selection.container.short_id().to_string(),
        )
    };

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let name = format!("wharf-logs-{}-{}.{}", short_id, stamp, format);
    let content = if format == "json" {
        match serde_json::to_string_pretty(&lines) {
            Ok(json) => json,
            Err(e) => {
                notice(bus, NoticeLevel::Error, format!("export failed: {}", e));
                return;
            }
        }
    } else {
        lines.join("\n")
    };

    match std::fs::write(&name, content) {
        Ok(()) => notice(bus, NoticeLevel::Success, format!("exported {}", name)),
        Err(e) => notice(bus, NoticeLevel::Error, format!("export failed: {}", e)),
    }
}

// ─────────────────────────── rendering ───────────────────────────

fn draw_app(
    f: &mut ratatui::Frame,
    snapshot: &DashboardState,
    ui: &mut UiState,
    theme: &Theme,
) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());

    // Tab bar
    let mut tab_spans: Vec<Span> = vec![Span::styled(" wharf ", theme.title())];
    for (i, view) in View::all().iter().enumerate() {
        tab_spans.push(Span::styled(
            format!(" {}:{} ", i + 1, view.label()),
            theme.tab_style(*view == ui.view),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(tab_spans)), outer[0]);

    match ui.view {
        View::Dashboard => draw_dashboard(f, outer[1], snapshot, ui, theme),
        View::Alerts => draw_alerts(f, outer[1], snapshot, ui, theme),
        View::Images => draw_images(f, outer[1], ui, theme),
        View::System => draw_system(f, outer[1], snapshot, ui, theme),
    }

    draw_footer(f, outer[2], snapshot, ui, theme);

    if let Some(form) = &ui.settings {
        draw_settings(f, form, ui, theme);
    }
    if ui.help_open {
        draw_help(f, theme);
    }
}

fn draw_footer(
    f: &mut ratatui::Frame,
    area: Rect,
    snapshot: &DashboardState,
    ui: &UiState,
    theme: &Theme,
) {
    if ui.mode != InputMode::Normal {
        let line = Line::from(vec![
            Span::styled(format!(" {}: ", ui.mode.prompt()), theme.accent()),
            Span::styled(ui.input.clone(), theme.text()),
            Span::styled("▏", theme.accent()),
            Span::styled("  (Enter apply · Esc cancel)", theme.text_muted()),
        ]);
        f.render_widget(Paragraph::new(line), area);
        return;
    }

    if let Some(last) = snapshot.notices.back() {
        let style = match last.level {
            NoticeLevel::Info => theme.text_dim(),
            NoticeLevel::Success => theme.success(),
            NoticeLevel::Error => theme.error(),
        };
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(format!(" {}", last.text), style))),
            area,
        );
        return;
    }

    let hints = match ui.view {
        View::Dashboard => {
            " ↑↓ move · Enter select · f status · c containers · / logs · a follow · x clear · e/E export · s stats · o settings · ? help · q quit"
        }
        View::Alerts => " / date filter · t test notification · R refresh · o settings · q quit",
        View::Images => {
            " ↑↓ move · Enter history · p pull · n scan · x delete · / filter · R refresh · q quit"
        }
        View::System => " / date filter · v raw version · R refresh · q quit",
    };
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(hints, theme.key_hint()))),
        area,
    );
}

fn draw_dashboard(
    f: &mut ratatui::Frame,
    area: Rect,
    snapshot: &DashboardState,
    ui: &mut UiState,
    theme: &Theme,
) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    // Container list
    let visible = visible_containers(&snapshot.containers, &ui.container_filter);
    if !visible.is_empty() && ui.cursor >= visible.len() {
        ui.cursor = visible.len() - 1;
    }
    ui.list_state
        .select(if visible.is_empty() { None } else { Some(ui.cursor) });

    let selected_id = snapshot
        .selection
        .as_ref()
        .map(|s| s.container.id.as_str());
    let items: Vec<ListItem> = visible
        .iter()
        .map(|c| {
            let state = wharf_core::model::classify(&c.status, false);
            let marker = if Some(c.id.as_str()) == selected_id {
                "▶"
            } else {
                " "
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", marker), theme.accent()),
                Span::styled(format!("{} ", theme.state_icon(state)), theme.state_style(state)),
                Span::styled(c.name.clone(), theme.text()),
                Span::styled(format!("  {}", c.image), theme.text_muted()),
            ]))
        })
        .collect();

    let mut list_title = format!(
        " Containers [{}] {}/{} ",
        ui.container_filter.status.label(),
        visible.len(),
        snapshot.containers.len()
    );
    if !ui.container_filter.query.is_empty() {
        list_title.push_str(&format!("/{}/ ", ui.container_filter.query));
    }
    let list = List::new(items)
        .block(
            Block::default()
                .title(list_title)
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        )
        .highlight_style(theme.selection_style());
    f.render_stateful_widget(list, cols[0], &mut ui.list_state);

    // Right side: details, stats, logs
    let stats_height = if ui.stats_enabled { 16 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(stats_height),
            Constraint::Min(3),
        ])
        .split(cols[1]);

    draw_details(f, rows[0], snapshot, theme);
    if ui.stats_enabled {
        draw_stats(f, rows[1], snapshot, theme);
    }
    draw_logs(f, rows[2], snapshot, ui, theme);
}

fn draw_details(f: &mut ratatui::Frame, area: Rect, snapshot: &DashboardState, theme: &Theme) {
    let block = Block::default()
        .title(" Selected ")
        .borders(Borders::ALL)
        .border_style(theme.border_style(false));

    let lines = match snapshot.selection.as_ref() {
        Some(sel) => {
            let c = &sel.container;
            let state = sel.classification();
            vec![
                Line::from(vec![
                    Span::styled(c.name.clone(), theme.title()),
                    Span::styled(format!("  {}", c.short_id()), theme.text_muted()),
                    Span::styled(
                        format!("  {} {}", theme.state_icon(state), c.status),
                        theme.state_style(state),
                    ),
                ]),
                Line::from(vec![
                    Span::styled(format!("image: {}", c.image), theme.text_dim()),
                    Span::styled(format!("  uptime: {}", c.uptime), theme.text_dim()),
                    Span::styled(
                        if c.ports.is_empty() {
                            String::new()
                        } else {
                            format!("  ports: {}", c.ports_text())
                        },
                        theme.text_dim(),
                    ),
                ]),
            ]
        }
        None => vec![Line::from(Span::styled(
            "no container selected. Enter on a row to attach",
            theme.text_muted(),
        ))],
    };
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn axis_labels(chart: &wharf_core::series::ChartBuffer) -> Vec<Span<'static>> {
    let labels: Vec<&str> = chart.labels().collect();
    match (labels.first(), labels.last()) {
        (Some(first), Some(last)) if labels.len() > 1 => vec![
            Span::raw(first.to_string()),
            Span::raw(last.to_string()),
        ],
        (Some(only), _) => vec![Span::raw(only.to_string())],
        _ => vec![],
    }
}

fn draw_stats(f: &mut ratatui::Frame, area: Rect, snapshot: &DashboardState, theme: &Theme) {
    let Some(selection) = snapshot.selection.as_ref() else {
        let block = Block::default()
            .title(" Stats ")
            .borders(Borders::ALL)
            .border_style(theme.border_style(false));
        f.render_widget(block, area);
        return;
    };

    if snapshot.overlay_visible() {
        // Stats overlay: shown in place of the charts whenever live
        // telemetry is unobtainable for this container.
        let block = Block::default()
            .title(" Stats ")
            .borders(Borders::ALL)
            .border_style(theme.border_style(false));
        let volume_line = volume_text(&selection.volume);
        let overlay = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "⏸  stats unavailable: container is stopped",
                theme.warn(),
            )),
            Line::from(Span::styled(
                "logs remain available below",
                theme.text_muted(),
            )),
            Line::from(""),
            Line::from(Span::styled(volume_line, theme.text_dim())),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        f.render_widget(overlay, area);
        return;
    }

    let charts = &snapshot.charts;
    let cap = charts.cpu.cap().saturating_sub(1).max(1) as f64;

    let grid = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(grid[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(grid[1]);

    // CPU
    let cpu_data = charts.cpu.points(0);
    let cpu_title = format!(
        " CPU {} ",
        charts
            .cpu
            .latest(0)
            .map(|v| format!("{:.1}%", v))
            .unwrap_or_else(|| "—".into())
    );
    let cpu_chart = Chart::new(vec![Dataset::default()
        .name("cpu")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(theme.accent())
        .data(&cpu_data)])
    .block(
        Block::default()
            .title(cpu_title)
            .borders(Borders::ALL)
            .border_style(theme.border_style(false)),
    )
    .x_axis(Axis::default().bounds([0.0, cap]).labels(axis_labels(&charts.cpu)))
    .y_axis(
        Axis::default()
            .bounds([0.0, 100.0])
            .labels(vec![Span::raw("0"), Span::raw("100")]),
    );
    f.render_widget(cpu_chart, top[0]);

    // Memory
    let mem_data = charts.mem.points(0);
    let mem_max = charts.mem.max_value().max(1.0);
    let mem_title = format!(
        " MEM {} ",
        charts
            .mem
            .latest(0)
            .map(|v| format!("{:.0} MB", v))
            .unwrap_or_else(|| "—".into())
    );
    let mem_chart = Chart::new(vec![Dataset::default()
        .name("mem")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(theme.success())
        .data(&mem_data)])
    .block(
        Block::default()
            .title(mem_title)
            .borders(Borders::ALL)
            .border_style(theme.border_style(false)),
    )
    .x_axis(Axis::default().bounds([0.0, cap]).labels(axis_labels(&charts.mem)))
    .y_axis(
        Axis::default()
            .bounds([0.0, mem_max])
            .labels(vec![Span::raw("0"), Span::raw(format!("{:.0}", mem_max))]),
    );
    f.render_widget(mem_chart, top[1]);

    // Network (rx/tx)
    let rx_data = charts.net.points(0);
    let tx_data = charts.net.points(1);
    let net_max = charts.net.max_value().max(1.0);
    let net_title = format!(
        " NET ↓{} ↑{} MB ",
        charts
            .net
            .latest(0)
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "—".into()),
        charts
            .net
            .latest(1)
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "—".into())
    );
    let net_chart = Chart::new(vec![
        Dataset::default()
            .name("rx")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.warn())
            .data(&rx_data),
        Dataset::default()
            .name("tx")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.error())
            .data(&tx_data),
    ])
    .block(
        Block::default()
            .title(net_title)
            .borders(Borders::ALL)
            .border_style(theme.border_style(false)),
    )
    .x_axis(Axis::default().bounds([0.0, cap]).labels(axis_labels(&charts.net)))
    .y_axis(
        Axis::default()
            .bounds([0.0, net_max])
            .labels(vec![Span::raw("0"), Span::raw(format!("{:.0}", net_max))]),
    );
    f.render_widget(net_chart, bottom[0]);

    // Disk (read/write)
    let read_data = charts.disk.points(0);
    let write_data = charts.disk.points(1);
    let disk_max = charts.disk.max_value().max(1.0);
    let disk_title = format!(
        " DISK R:{} W:{} MB · vol: {} ",
        charts
            .disk
            .latest(0)
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "—".into()),
        charts
            .disk
            .latest(1)
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "—".into()),
        volume_text(&selection.volume),
    );
    let disk_chart = Chart::new(vec![
        Dataset::default()
            .name("read")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.accent())
            .data(&read_data),
        Dataset::default()
            .name("write")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.warn())
            .data(&write_data),
    ])
    .block(
        Block::default()
            .title(disk_title)
            .borders(Borders::ALL)
            .border_style(theme.border_style(false)),
    )
    .x_axis(Axis::default().bounds([0.0, cap]).labels(axis_labels(&charts.disk)))
    .y_axis(
        Axis::default()
            .bounds([0.0, disk_max])
            .labels(vec![Span::raw("0"), Span::raw(format!("{:.0}", disk_max))]),
    );
    f.render_widget(disk_chart, bottom[1]);
}

fn volume_text(volume: &VolumeState) -> String {
    match volume {
        VolumeState::NotFetched => "—".into(),
        VolumeState::Pending => "calculating...".into(),
        VolumeState::Failed(e) => format!("error: {}", e),
        VolumeState::Ready(VolumeUsage::Stopped) => "N/A (stopped)".into(),
        VolumeState::Ready(VolumeUsage::Report(report)) => {
            if report.mounts.is_empty() {
                "no binds/volumes".into()
            } else {
                format!("{} MB across {} mount(s)", report.total_mb, report.mounts.len())
            }
        }
    }
}

fn draw_logs(
    f: &mut ratatui::Frame,
    area: Rect,
    snapshot: &DashboardState,
    ui: &UiState,
    theme: &Theme,
) {
    let all: Vec<&str> = snapshot.logs.iter().collect();
    let shown: Vec<&str> = all
        .iter()
        .copied()
        .filter(|l| ui.log_search.matches(l))
        .collect();

    let height = area.height.saturating_sub(2) as usize;
    let end = if ui.autoscroll {
        shown.len()
    } else {
        shown.len().saturating_sub(ui.log_scroll)
    };
    let start = end.saturating_sub(height);
    let window: Vec<Line> = shown[start..end]
        .iter()
        .map(|l| Line::from(Span::styled((*l).to_string(), theme.text())))
        .collect();

    let mut title = format!(" Logs {}/{} ", shown.len(), all.len());
    if ui.log_search.is_active() {
        title.push_str(&format!("/{}/ ", ui.log_search.query));
    }
    title.push_str(if ui.autoscroll { "follow " } else { "paused " });

    let logs = Paragraph::new(window).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(theme.border_style(true)),
    );
    f.render_widget(logs, area);
}

fn draw_alerts(
    f: &mut ratatui::Frame,
    area: Rect,
    snapshot: &DashboardState,
    ui: &UiState,
    theme: &Theme,
) {
    let records = visible_records(&snapshot.alerts, &ui.alerts_date, CONTAINER_ALERTS_CAP);

    let mut title = format!(" Alerts {} (cap {}) ", records.len(), CONTAINER_ALERTS_CAP);
    if !ui.alerts_date.prefix.is_empty() {
        title.push_str(&format!("date:{} ", ui.alerts_date.prefix));
    }

    let lines: Vec<Line> = if records.is_empty() {
        vec![Line::from(Span::styled(
            "no alerts found",
            theme.text_muted(),
        ))]
    } else {
        records
            .iter()
            .map(|r| {
                Line::from(vec![
                    Span::styled(format!("{:<20}", r.display_time()), theme.text_dim()),
                    Span::styled(format!("{:<7}", r.level.label()), theme.level_style(r.level)),
                    Span::styled(format!("{:<20}", r.container), theme.text()),
                    Span::styled(r.message.clone(), theme.text()),
                ])
            })
            .collect()
    };

    let list = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(theme.border_style(false)),
    );
    f.render_widget(list, area);
}

fn draw_images(f: &mut ratatui::Frame, area: Rect, ui: &mut UiState, theme: &Theme) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let visible = visible_images(&ui.images, &ui.image_filter);
    if !visible.is_empty() && ui.image_cursor >= visible.len() {
        ui.image_cursor = visible.len() - 1;
    }
    ui.image_state
        .select(if visible.is_empty() { None } else { Some(ui.image_cursor) });

    let items: Vec<ListItem> = visible
        .iter()
        .map(|img| {
            ListItem::new(vec![
                Line::from(Span::styled(img.display_tag().to_string(), theme.text())),
                Line::from(Span::styled(
                    format!("  {} MB · {}", img.size_mb, img.created),
                    theme.text_muted(),
                )),
            ])
        })
        .collect();

    let mut title = format!(" Images {} ", visible.len());
    if !ui.image_filter.is_empty() {
        title.push_str(&format!("/{}/ ", ui.image_filter));
    }
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        )
        .highlight_style(theme.selection_style());
    f.render_stateful_widget(list, cols[0], &mut ui.image_state);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Percentage(40),
            Constraint::Min(4),
        ])
        .split(cols[1]);

    // Detail header
    let detail_lines = match visible.get(ui.image_cursor) {
        Some(img) => vec![
            Line::from(Span::styled(img.display_tag().to_string(), theme.title())),
            Line::from(Span::styled(
                format!("{} · {} MB · created {}", img.id, img.size_mb, img.created),
                theme.text_dim(),
            )),
        ],
        None => vec![Line::from(Span::styled("no image selected", theme.text_muted()))],
    };
    f.render_widget(
        Paragraph::new(detail_lines).block(
            Block::default()
                .title(" Image ")
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        ),
        rows[0],
    );

    // History
    let history_lines: Vec<Line> = match &ui.image_history {
        Some(layers) if !layers.is_empty() => layers
            .iter()
            .map(|l| {
                Line::from(vec![
                    Span::styled(format!("{:<11}", l.created), theme.text_muted()),
                    Span::styled(format!("{:>6} MB  ", l.size_mb), theme.text_dim()),
                    Span::styled(l.created_by.clone(), theme.text()),
                ])
            })
            .collect(),
        Some(_) => vec![Line::from(Span::styled("empty history", theme.text_muted()))],
        None => vec![Line::from(Span::styled(
            "Enter on an image to load its history",
            theme.text_muted(),
        ))],
    };
    f.render_widget(
        Paragraph::new(history_lines).block(
            Block::default()
                .title(" History ")
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        ),
        rows[1],
    );

    // Scan output or pull progress, whichever is active
    let (pane_title, pane_lines): (&str, Vec<Line>) = if !ui.pull_lines.is_empty() {
        (
            " Pull ",
            ui.pull_lines
                .iter()
                .rev()
                .take(rows[2].height.saturating_sub(2) as usize)
                .rev()
                .map(|l| Line::from(Span::styled(l.clone(), theme.text())))
                .collect(),
        )
    } else {
        (
            " Scan ",
            match &ui.scan_text {
                Some(text) => text
                    .lines()
                    .take(rows[2].height.saturating_sub(2) as usize)
                    .map(|l| Line::from(Span::styled(l.to_string(), theme.text())))
                    .collect(),
                None => vec![Line::from(Span::styled("no scan run", theme.text_muted()))],
            },
        )
    };
    f.render_widget(
        Paragraph::new(pane_lines).block(
            Block::default()
                .title(pane_title)
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        ),
        rows[2],
    );
}

fn version_rows(version: &serde_json::Value) -> Vec<(String, String)> {
    let keys = [
        "Version",
        "ApiVersion",
        "MinAPIVersion",
        "GitCommit",
        "GoVersion",
        "Os",
        "Arch",
        "KernelVersion",
    ];
    let mut rows = Vec::new();
    for key in keys {
        if let Some(value) = version.get(key).and_then(|v| v.as_str()) {
            rows.push((key.to_string(), value.to_string()));
        }
    }
    if let Some(platform) = version
        .get("Platform")
        .and_then(|p| p.get("Name"))
        .and_then(|v| v.as_str())
    {
        if !platform.is_empty() {
            rows.push(("Platform".into(), platform.to_string()));
        }
    }
    rows
}

fn draw_system(
    f: &mut ratatui::Frame,
    area: Rect,
    snapshot: &DashboardState,
    ui: &UiState,
    theme: &Theme,
) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(7)])
        .split(cols[0]);

    // Version
    let version_lines: Vec<Line> = match &ui.overview {
        Some(overview) => {
            if ui.show_raw_version {
                serde_json::to_string_pretty(&overview.version)
                    .unwrap_or_else(|_| "{}".into())
                    .lines()
                    .map(|l| Line::from(Span::styled(l.to_string(), theme.text_dim())))
                    .collect()
            } else {
                version_rows(&overview.version)
                    .into_iter()
                    .map(|(k, v)| {
                        Line::from(vec![
                            Span::styled(format!("{:<16}", k), theme.text_muted()),
                            Span::styled(v, theme.text()),
                        ])
                    })
                    .collect()
            }
        }
        None => vec![Line::from(Span::styled("loading...", theme.text_muted()))],
    };
    f.render_widget(
        Paragraph::new(version_lines).block(
            Block::default()
                .title(" Version (v: raw) ")
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        ),
        rows[0],
    );

    // Disk usage
    let df_lines: Vec<Line> = match &ui.overview {
        Some(overview) => {
            let df = &overview.df;
            vec![
                Line::from(Span::styled(
                    format!("{:<12} {:>6} {:>12}", "Type", "Count", "Total"),
                    theme.text_muted(),
                )),
                Line::from(Span::styled(
                    format!(
                        "{:<12} {:>6} {:>12}",
                        "Images",
                        df.images.count,
                        format_bytes(df.images.total_bytes)
                    ),
                    theme.text(),
                )),
                Line::from(Span::styled(
                    format!(
                        "{:<12} {:>6} {:>12}",
                        "Containers",
                        df.containers.count,
                        format_bytes(df.containers.total_bytes)
                    ),
                    theme.text(),
                )),
                Line::from(Span::styled(
                    format!(
                        "{:<12} {:>6} {:>12}",
                        "Volumes",
                        df.volumes.count,
                        format_bytes(df.volumes.total_bytes)
                    ),
                    theme.text(),
                )),
            ]
        }
        None => vec![Line::from(Span::styled("loading...", theme.text_muted()))],
    };
    f.render_widget(
        Paragraph::new(df_lines).block(
            Block::default()
                .title(" Disk usage ")
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        ),
        rows[1],
    );

    // System events (shared history, wider cap)
    let records = visible_records(&snapshot.alerts, &ui.events_date, SYSTEM_EVENTS_CAP);
    let mut title = format!(" Events {} (cap {}) ", records.len(), SYSTEM_EVENTS_CAP);
    if !ui.events_date.prefix.is_empty() {
        title.push_str(&format!("date:{} ", ui.events_date.prefix));
    }
    let event_lines: Vec<Line> = if records.is_empty() {
        vec![Line::from(Span::styled(
            "no system activity/events found",
            theme.text_muted(),
        ))]
    } else {
        records
            .iter()
            .map(|r| {
                Line::from(vec![
                    Span::styled(format!("{:<20}", r.display_time()), theme.text_dim()),
                    Span::styled(format!("{:<7}", r.level.label()), theme.level_style(r.level)),
                    Span::styled(r.message.clone(), theme.text()),
                ])
            })
            .collect()
    };
    f.render_widget(
        Paragraph::new(event_lines).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(theme.border_style(false)),
        ),
        cols[1],
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_settings(f: &mut ratatui::Frame, form: &SettingsForm, ui: &UiState, theme: &Theme) {
    let area = centered_rect(64, (SETTINGS_FIELDS.len() + 4) as u16, f.area());
    f.render_widget(Clear, area);

    let mut lines: Vec<Line> = SETTINGS_FIELDS
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let selected = i == form.cursor;
            let editing = selected && ui.mode == InputMode::EditField;
            let value = if editing {
                format!("{}▏", ui.input)
            } else {
                form.value_text(*field)
            };
            let style = if selected {
                theme.selection_style()
            } else {
                theme.text()
            };
            Line::from(vec![
                Span::styled(format!(" {:<20}", field.label()), style),
                Span::styled(value, if editing { theme.accent() } else { style }),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Enter edit · Space toggle · s save · t test · Esc close",
        theme.key_hint(),
    )));

    let block = Block::default()
        .title(" Settings ")
        .borders(Borders::ALL)
        .border_style(theme.border_style(true));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_help(f: &mut ratatui::Frame, theme: &Theme) {
    let area = centered_rect(58, 18, f.area());
    f.render_widget(Clear, area);

    let lines: Vec<Line> = [
        ("1-4", "switch view"),
        ("↑/↓ + Enter", "select container / image"),
        ("f", "cycle container status filter"),
        ("c", "container search"),
        ("/", "search logs (dashboard) / filter (other views)"),
        ("a", "toggle log follow"),
        ("x", "clear logs / delete image"),
        ("e / E", "export logs as txt / json"),
        ("s", "toggle stats panel"),
        ("p / n", "pull / scan image"),
        ("t", "send test notification"),
        ("o", "settings"),
        ("R", "refresh current view"),
        ("q", "quit"),
    ]
    .iter()
    .map(|(key, what)| {
        Line::from(vec![
            Span::styled(format!(" {:<12}", key), theme.key_hint()),
            Span::styled(*what, theme.text()),
        ])
    })
    .collect();

    let block = Block::default()
        .title(" Help (any key to close) ")
        .borders(Borders::ALL)
        .border_style(theme.border_style(true));
    f.render_widget(Paragraph::new(lines).block(block), area);
}
