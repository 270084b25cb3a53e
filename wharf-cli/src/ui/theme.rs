//! UI theme: palette tokens and style helpers
//!
//! The active palette is chosen from the persisted config and can be
//! switched at runtime from the settings overlay.

use ratatui::style::{Color, Modifier, Style};

use wharf_core::alert::AlertLevel;
use wharf_core::config::ThemeChoice;
use wharf_core::model::ContainerState;

/// Color palette tokens for the theme
#[derive(Clone, Debug)]
pub struct Palette {
    pub panel_border: Color,
    pub text: Color,
    pub text_dim: Color,
    pub text_muted: Color,
    pub accent: Color,
    pub success: Color,
    pub warn: Color,
    pub error: Color,
    pub info: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub key_hint: Color,
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            panel_border: Color::Rgb(60, 60, 60),
            text: Color::Rgb(212, 212, 212),
            text_dim: Color::Rgb(150, 150, 150),
            text_muted: Color::Rgb(100, 100, 100),
            accent: Color::Rgb(79, 193, 255),
            success: Color::Rgb(78, 201, 176),
            warn: Color::Rgb(220, 180, 100),
            error: Color::Rgb(244, 135, 113),
            info: Color::Rgb(156, 220, 254),
            selection_bg: Color::Rgb(38, 79, 120),
            selection_fg: Color::White,
            key_hint: Color::Rgb(206, 145, 120),
        }
    }

    pub fn high_contrast() -> Self {
        Self {
            panel_border: Color::White,
            text: Color::White,
            text_dim: Color::Rgb(200, 200, 200),
            text_muted: Color::Rgb(150, 150, 150),
            accent: Color::Cyan,
            success: Color::Green,
            warn: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            selection_bg: Color::Blue,
            selection_fg: Color::White,
            key_hint: Color::Yellow,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Theme {
    pub palette: Palette,
}

impl Theme {
    pub fn from_choice(choice: ThemeChoice) -> Self {
        let palette = match choice {
            ThemeChoice::Dark => Palette::dark(),
            ThemeChoice::HighContrast => Palette::high_contrast(),
        };
        Self { palette }
    }

    pub fn state_style(&self, state: ContainerState) -> Style {
        let color = match state {
            ContainerState::Running => self.palette.success,
            ContainerState::Stopped => self.palette.error,
        };
        Style::default().fg(color)
    }

    pub fn state_icon(&self, state: ContainerState) -> &'static str {
        match state {
            ContainerState::Running => "●",
            ContainerState::Stopped => "○",
        }
    }

    pub fn level_style(&self, level: AlertLevel) -> Style {
        let color = match level {
            AlertLevel::High => self.palette.error,
            AlertLevel::State => self.palette.accent,
            AlertLevel::Info => self.palette.info,
            AlertLevel::Other => self.palette.text_dim,
        };
        Style::default().fg(color)
    }

    pub fn tab_style(&self, active: bool) -> Style {
        if active {
            Style::default()
                .fg(self.palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.palette.text_dim)
        }
    }

    pub fn border_style(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.palette.accent)
        } else {
            Style::default().fg(self.palette.panel_border)
        }
    }

    pub fn selection_style(&self) -> Style {
        Style::default()
            .bg(self.palette.selection_bg)
            .fg(self.palette.selection_fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text(&self) -> Style {
        Style::default().fg(self.palette.text)
    }

    pub fn text_dim(&self) -> Style {
        Style::default().fg(self.palette.text_dim)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.palette.text_muted)
    }

    pub fn accent(&self) -> Style {
        Style::default().fg(self.palette.accent)
    }

    pub fn success(&self) -> Style {
        Style::default().fg(self.palette.success)
    }

    pub fn warn(&self) -> Style {
        Style::default().fg(self.palette.warn)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(self.palette.error)
    }

    pub fn key_hint(&self) -> Style {
        Style::default().fg(self.palette.key_hint)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.palette.text)
            .add_modifier(Modifier::BOLD)
    }
}
