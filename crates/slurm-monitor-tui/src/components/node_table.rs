//! Node table with cluster totals and a down/drain alert.

use crate::format::{mem_pair, percent, ratio, truncate};
use crate::ui::Theme;
use ratatui::layout::{Constraint, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Row, Table};
use ratatui::Frame;
use slurm_monitor_slurm::Snapshot;

pub struct NodeTable;

impl NodeTable {
    pub fn render(frame: &mut Frame, area: Rect, snapshot: &Snapshot, theme: &Theme, compact: bool) {
        let compact = compact || area.width < 110;
        // Borders, header row, and the TOTAL row are always present.
        let visible = usize::from(area.height.saturating_sub(4));
        let total_nodes = snapshot.nodes.len();
        let nodes = &snapshot.nodes[..total_nodes.min(visible)];
        let hidden = total_nodes - nodes.len();

        let mut title_spans = vec![Span::styled(
            if hidden > 0 {
                format!(
                    "◌ node summary (top {}/{}, +{} hidden)",
                    nodes.len(),
                    total_nodes,
                    hidden
                )
            } else {
                "◌ node summary".to_string()
            },
            theme.table_header,
        )];
        if let Some(alert) = node_state_alert(snapshot) {
            title_spans.push(Span::raw("  "));
            title_spans.push(Span::styled(alert, theme.bad));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border)
            .title(Line::from(title_spans));

        let totals = snapshot.totals();
        let (header, widths, rows) = if compact {
            let header = Row::new(vec!["node", "part", "state", "cpu", "mem", "gpu"])
                .style(theme.table_header);
            let widths = vec![
                Constraint::Length(16),
                Constraint::Length(10),
                Constraint::Length(12),
                Constraint::Length(9),
                Constraint::Length(14),
                Constraint::Length(9),
            ];
            let mut rows: Vec<Row> = nodes
                .iter()
                .map(|n| {
                    Row::new(vec![
                        truncate(&n.name, 16),
                        truncate(&n.partition, 10),
                        truncate(&n.state, 12),
                        ratio(n.cpu_alloc, n.cpu_total),
                        mem_pair(n.mem_alloc_mb, n.mem_total_mb),
                        ratio(n.gpu_alloc, n.gpu_total),
                    ])
                })
                .collect();
            rows.push(
                Row::new(vec![
                    "TOTAL".to_string(),
                    String::new(),
                    String::new(),
                    ratio(totals.cpu_alloc, totals.cpu_total),
                    mem_pair(totals.mem_alloc_mb, totals.mem_total_mb),
                    ratio(totals.gpu_alloc, totals.gpu_total),
                ])
                .style(theme.accent),
            );
            (header, widths, rows)
        } else {
            let header = Row::new(vec![
                "node", "partition", "state", "cpu", "cpu%", "mem", "mem%", "gpu", "gpu%",
            ])
            .style(theme.table_header);
            let widths = vec![
                Constraint::Length(14),
                Constraint::Length(12),
                Constraint::Length(14),
                Constraint::Length(10),
                Constraint::Length(7),
                Constraint::Length(14),
                Constraint::Length(7),
                Constraint::Length(9),
                Constraint::Length(7),
            ];
            let mut rows: Vec<Row> = nodes
                .iter()
                .map(|n| {
                    let state_cell = if n.state.contains("DOWN") || n.state.contains("DRAIN") {
                        Cell::from(truncate(&n.state, 14)).style(theme.bad)
                    } else {
                        Cell::from(truncate(&n.state, 14))
                    };
                    Row::new(vec![
                        Cell::from(truncate(&n.name, 14)),
                        Cell::from(truncate(&n.partition, 12)),
                        state_cell,
                        Cell::from(ratio(n.cpu_alloc, n.cpu_total)),
                        Cell::from(percent(n.cpu_util_pct, n.has_cpu)),
                        Cell::from(mem_pair(n.mem_alloc_mb, n.mem_total_mb)),
                        Cell::from(percent(n.mem_util_pct, n.has_mem)),
                        Cell::from(ratio(n.gpu_alloc, n.gpu_total)),
                        Cell::from(percent(n.gpu_util_pct, n.has_gpu)),
                    ])
                })
                .collect();
            rows.push(
                Row::new(vec![
                    "TOTAL".to_string(),
                    String::new(),
                    String::new(),
                    ratio(totals.cpu_alloc, totals.cpu_total),
                    total_pct(totals.cpu_alloc, totals.cpu_total),
                    mem_pair(totals.mem_alloc_mb, totals.mem_total_mb),
                    total_pct(totals.mem_alloc_mb, totals.mem_total_mb),
                    ratio(totals.gpu_alloc, totals.gpu_total),
                    total_pct(totals.gpu_alloc, totals.gpu_total),
                ])
                .style(theme.accent),
            );
            (header, widths, rows)
        };

        let table = Table::new(rows, widths).header(header).block(block);
        frame.render_widget(table, area);
    }
}

fn total_pct(alloc: i64, total: i64) -> String {
    if total <= 0 {
        return "n/a".to_string();
    }
    format!("{:.1}%", alloc as f64 / total as f64 * 100.0)
}

/// Summarize unhealthy node states for the panel title.
fn node_state_alert(snapshot: &Snapshot) -> Option<String> {
    let mut down = 0;
    let mut drain = 0;
    for node in &snapshot.nodes {
        if node.state.contains("DOWN") {
            down += 1;
        }
        if node.state.contains("DRAIN") {
            drain += 1;
        }
    }
    match (down, drain) {
        (0, 0) => None,
        (0, drain) => Some(format!("node alert: drain={drain}")),
        (down, 0) => Some(format!("node alert: down={down}")),
        (down, drain) => Some(format!("node alert: down={down} drain={drain}")),
    }
}
