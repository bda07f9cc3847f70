//! Status header: title, source, clock, snapshot age, connection chip.

use crate::app::{App, StatusClass, PULSE_FRAMES};
use crate::format::human_duration;
use chrono::{Local, Utc};
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub struct Header;

impl Header {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let now = Utc::now();
        let (status, class) = app.status_text(now);
        let status_style = match class {
            StatusClass::Ok => app.theme.ok,
            StatusClass::Warn => app.theme.warn,
            StatusClass::Bad => app.theme.bad,
        };
        let pulse = PULSE_FRAMES[app.pulse_index % PULSE_FRAMES.len()];

        let age = match app.last_success {
            Some(last) => {
                let elapsed = (now - last).to_std().unwrap_or_default();
                format!("refresh: {} ago", human_duration(elapsed))
            }
            None => "refresh: never".to_string(),
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(" SLURM MONITOR ", app.theme.title),
            Span::raw("  "),
            Span::styled(format!("{pulse} {status}"), status_style),
            Span::raw("  "),
            Span::styled("source: ", app.theme.label),
            Span::styled(app.source.clone(), app.theme.value),
            Span::raw("  "),
            Span::styled(
                format!("clock: {}", Local::now().format("%H:%M:%S")),
                app.theme.dim,
            ),
            Span::raw("  "),
            Span::styled(age, app.theme.dim),
        ])];

        if !app.last_error.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("error: {}", app.last_error),
                app.theme.bad,
            )));
        }

        frame.render_widget(Paragraph::new(lines), area);
    }
}
