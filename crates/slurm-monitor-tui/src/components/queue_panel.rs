//! Queue counters and the per-user demand view.

use crate::format::truncate;
use crate::ui::Theme;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use slurm_monitor_slurm::Snapshot;

pub struct QueuePanel;

impl QueuePanel {
    pub fn render(frame: &mut Frame, area: Rect, snapshot: &Snapshot, theme: &Theme, compact: bool) {
        let queue = &snapshot.queue;
        let total = queue.running + queue.pending + queue.other;
        let show_demand = !compact && area.width >= 72;

        let counter = |label: &str, value: u32| {
            Line::from(vec![
                Span::styled(format!("{label:<8}"), theme.label),
                Span::styled(format!("{value:>6}"), theme.value),
            ])
        };

        let mut lines = vec![
            counter("running", queue.running),
            counter("pending", queue.pending),
            counter("other", queue.other),
            counter("total", total),
            Line::default(),
        ];

        // Users arrive pre-sorted by pending demand; just clip to the
        // rows that fit.
        let row_budget = usize::from(area.height.saturating_sub(2)).saturating_sub(lines.len() + 2);
        let total_users = snapshot.users.len();
        let users = &snapshot.users[..total_users.min(row_budget)];
        let hidden = total_users - users.len();

        let user_title = if hidden > 0 {
            format!("user view (top {}/{}, +{} hidden)", users.len(), total_users, hidden)
        } else {
            "user view".to_string()
        };
        lines.push(Line::from(Span::styled(
            format!("◒ {user_title}"),
            theme.table_header,
        )));

        if show_demand {
            lines.push(Line::from(Span::styled(
                format!(
                    "{:<14} {:>7} {:>7} {:>15} {:>15}",
                    "user", "running", "pending", "pendingCPUJobs", "pendingGPUJobs"
                ),
                theme.table_header,
            )));
            for user in users {
                lines.push(Line::from(format!(
                    "{:<14} {:>7} {:>7} {:>15} {:>15}",
                    truncate(&user.user, 14),
                    user.running,
                    user.pending,
                    user.pending_cpu_jobs,
                    user.pending_gpu_jobs,
                )));
            }
        } else {
            lines.push(Line::from(Span::styled(
                format!("{:<18} {:>8} {:>8}", "user", "running", "pending"),
                theme.table_header,
            )));
            for user in users {
                lines.push(Line::from(format!(
                    "{:<18} {:>8} {:>8}",
                    truncate(&user.user, 18),
                    user.running,
                    user.pending,
                )));
            }
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border)
            .title(Span::styled("◍ queue summary", theme.table_header));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
