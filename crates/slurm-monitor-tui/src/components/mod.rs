//! Dashboard panels.

mod footer;
mod header;
mod node_table;
mod queue_panel;

pub use footer::Footer;
pub use header::Header;
pub use node_table::NodeTable;
pub use queue_panel::QueuePanel;

use crate::ui::Theme;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Placeholder body before the first successful snapshot.
pub fn render_waiting(frame: &mut Frame, area: Rect, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border);
    let paragraph = Paragraph::new("waiting for first successful snapshot...")
        .style(theme.dim)
        .block(block);
    frame.render_widget(paragraph, area);
}
