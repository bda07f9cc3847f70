//! Value formatting shared by the dashboard panels.

use std::time::Duration;

/// `alloc/total` pair.
pub fn ratio(alloc: i64, total: i64) -> String {
    format!("{alloc}/{total}")
}

/// One-decimal percentage, or `n/a` when the reading is invalid.
pub fn percent(value: f64, ok: bool) -> String {
    if !ok {
        return "n/a".to_string();
    }
    format!("{value:.1}%")
}

/// Megabytes with a human unit (`512M`, `1.5G`, `2.0T`).
pub fn mem_mb(value: i64) -> String {
    if value >= 1024 * 1024 {
        return format!("{:.1}T", value as f64 / 1024.0 / 1024.0);
    }
    if value >= 1024 {
        return format!("{:.1}G", value as f64 / 1024.0);
    }
    format!("{value}M")
}

/// `alloc/total` memory pair with units.
pub fn mem_pair(alloc_mb: i64, total_mb: i64) -> String {
    format!("{}/{}", mem_mb(alloc_mb), mem_mb(total_mb))
}

/// Compact duration for countdowns and ages (`<1s`, `42s`, `3m10s`, `2h5m`).
pub fn human_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 1 {
        return "<1s".to_string();
    }
    if secs < 60 {
        return format!("{secs}s");
    }
    if secs < 3600 {
        return format!("{}m{}s", secs / 60, secs % 60);
    }
    format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
}

/// Truncate to `max` characters with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
