//! Dashboard styling.

use ratatui::style::{Color, Modifier, Style};

pub struct Theme {
    pub title: Style,
    pub dim: Style,
    pub border: Style,
    pub table_header: Style,
    pub label: Style,
    pub value: Style,
    pub ok: Style,
    pub warn: Style,
    pub bad: Style,
    pub accent: Style,
}

impl Theme {
    pub fn new(no_color: bool) -> Self {
        if no_color {
            return Self::plain();
        }
        Self {
            title: Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            dim: Style::default().fg(Color::DarkGray),
            border: Style::default().fg(Color::Blue),
            table_header: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::Gray),
            value: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            ok: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            warn: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            bad: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            accent: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        }
    }

    /// All-monochrome styles for `--no-color` terminals.
    fn plain() -> Self {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        Self {
            title: bold,
            dim: Style::default(),
            border: Style::default(),
            table_header: bold,
            label: Style::default(),
            value: bold,
            ok: bold,
            warn: bold,
            bad: bold,
            accent: bold,
        }
    }
}
