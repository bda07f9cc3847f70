//! Footer with key hints.

use crate::app::App;
use crate::format::human_duration;
use ratatui::layout::Rect;
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub struct Footer;

impl Footer {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let help = format!(
            "q:quit  Ctrl+C:quit  ·  polling every {}",
            human_duration(app.refresh)
        );
        frame.render_widget(Paragraph::new(help).style(app.theme.dim), area);
    }
}
