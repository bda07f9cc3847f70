//! Dashboard application state.

use crate::components::{Footer, Header, NodeTable, QueuePanel};
use crate::ui::Theme;
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;
use slurm_monitor_slurm::Snapshot;
use slurm_monitor_watch::{ConnectionState, Update};
use std::time::{Duration, Instant};

pub(crate) const PULSE_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Transport label shown in the header (`local`, `ssh:<host>`).
    pub source: String,
    pub compact: bool,
    pub no_color: bool,
    pub refresh: Duration,
    /// Total runtime limit; the app quits itself when it elapses.
    pub max_duration: Option<Duration>,
}

/// Dashboard state fed by the update stream.
///
/// Starts in `reconnecting` with no snapshot; the first update settles the
/// real state. A snapshot always clears the retained error banner.
pub struct App {
    pub(crate) source: String,
    pub(crate) compact: bool,
    pub(crate) refresh: Duration,
    max_duration: Option<Duration>,
    started: Instant,

    pub should_quit: bool,
    pub(crate) pulse_index: usize,

    pub(crate) state: ConnectionState,
    pub(crate) last_error: String,
    pub(crate) last_success: Option<DateTime<Utc>>,
    pub(crate) next_retry: Option<DateTime<Utc>>,
    pub(crate) snapshot: Option<Snapshot>,

    pub(crate) theme: Theme,
}

impl App {
    pub fn new(options: AppOptions) -> Self {
        Self {
            source: options.source,
            compact: options.compact,
            refresh: options.refresh,
            max_duration: options.max_duration,
            started: Instant::now(),
            should_quit: false,
            pulse_index: 0,
            state: ConnectionState::Reconnecting,
            last_error: String::new(),
            last_success: None,
            next_retry: None,
            snapshot: None,
            theme: Theme::new(options.no_color),
        }
    }

    /// Fold one loop update into the view state.
    pub fn apply_update(&mut self, update: Update) {
        self.state = update.state;
        self.last_error = update.last_error;
        self.last_success = update.last_success;
        self.next_retry = update.next_retry;
        if let Some(snapshot) = update.snapshot {
            self.snapshot = Some(snapshot);
            self.last_error.clear();
        }
    }

    /// The loop closed the update channel; nothing more will arrive.
    pub fn on_channel_closed(&mut self) {
        self.should_quit = true;
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        let ctrl_c =
            key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl_c || key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
            self.should_quit = true;
        }
    }

    /// One-second heartbeat: animates the pulse and enforces the runtime
    /// limit.
    pub fn tick(&mut self) {
        self.pulse_index = (self.pulse_index + 1) % PULSE_FRAMES.len();
        if let Some(max) = self.max_duration {
            if self.started.elapsed() >= max {
                self.should_quit = true;
            }
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let header_height = if self.last_error.is_empty() { 1 } else { 2 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header_height),
                Constraint::Min(6),
                Constraint::Length(8.min(frame.area().height / 3).max(6)),
                Constraint::Length(1),
            ])
            .split(frame.area());

        Header::render(frame, chunks[0], self);
        match &self.snapshot {
            Some(snapshot) => {
                NodeTable::render(frame, chunks[1], snapshot, &self.theme, self.compact);
                QueuePanel::render(frame, chunks[2], snapshot, &self.theme, self.compact);
            }
            None => {
                crate::components::render_waiting(frame, chunks[1], &self.theme);
            }
        }
        Footer::render(frame, chunks[3], self);
    }

    /// Header status text plus its style class.
    pub(crate) fn status_text(&self, now: DateTime<Utc>) -> (String, StatusClass) {
        if self.snapshot.is_none() && self.last_error.trim().is_empty() {
            return ("loading".to_string(), StatusClass::Warn);
        }

        let retry_suffix = || {
            self.next_retry
                .filter(|retry| *retry > now)
                .map(|retry| {
                    let wait = (retry - now).to_std().unwrap_or_default();
                    format!(" (retry in {})", crate::format::human_duration(wait))
                })
                .unwrap_or_default()
        };

        match self.state {
            ConnectionState::Connected => ("connected".to_string(), StatusClass::Ok),
            ConnectionState::Reconnecting => {
                (format!("reconnecting{}", retry_suffix()), StatusClass::Warn)
            }
            ConnectionState::DisconnectedRecovering => (
                format!("disconnected, recovering{}", retry_suffix()),
                StatusClass::Bad,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    Ok,
    Warn,
    Bad,
}
