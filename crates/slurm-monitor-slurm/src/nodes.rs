//! Parse `scontrol show node -o` output into typed nodes.

use crate::types::Node;
use slurm_monitor_parsers::{
    leading_int, leading_int_opt, parse_float_field, parse_tres_mem_mb, tres_entries,
};
use std::collections::HashMap;
use thiserror::Error;

/// A node line without the mandatory `NodeName` field fails the whole
/// collection; everything else degrades to defaults.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing NodeName in line: {line}")]
pub struct NodeParseError {
    pub line: String,
}

/// Parse the full node listing, one node per non-empty line, sorted
/// ascending by name.
pub fn parse_node_lines(raw: &str) -> Result<Vec<Node>, NodeParseError> {
    let mut out = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        out.push(parse_node_line(line)?);
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn parse_node_line(line: &str) -> Result<Node, NodeParseError> {
    let fields = parse_kv_line(line);
    let name = fields.get("NodeName").copied().unwrap_or("");
    if name.is_empty() {
        return Err(NodeParseError {
            line: line.to_string(),
        });
    }

    let field = |key: &str| fields.get(key).copied().unwrap_or("");

    let cpu_alloc = leading_int(field("CPUAlloc"));
    let cpu_total = leading_int(field("CPUTot"));
    let mut mem_alloc = leading_int(field("AllocMem"));
    let mem_total = leading_int(field("RealMemory"));

    if mem_alloc == 0 {
        mem_alloc = parse_tres_mem_mb(field("AllocTRES"));
    }

    let (cpu_util_pct, has_cpu) = cpu_util(field("CPULoad"), cpu_total);
    let (mem_util_pct, has_mem) = mem_util(field("FreeMem"), mem_total);

    let gpu_alloc = tres_gpu_count(field("AllocTRES"));
    let gpu_total = tres_gpu_count(field("CfgTRES"));
    let (gpu_util_pct, has_gpu) = alloc_util_pct(gpu_alloc, gpu_total);

    let mut state = clean_node_state(field("State"));
    if state.is_empty() {
        state = "UNKNOWN".to_string();
    }

    Ok(Node {
        name: name.to_string(),
        state,
        partition: field("Partitions").to_string(),
        cpu_alloc,
        cpu_total,
        cpu_util_pct,
        has_cpu,
        mem_alloc_mb: mem_alloc,
        mem_total_mb: mem_total,
        mem_util_pct,
        has_mem,
        gpu_alloc,
        gpu_total,
        gpu_util_pct,
        has_gpu,
    })
}

/// Split a one-line node record into its `KEY=VALUE` tokens.
/// Tokens without `=` are ignored.
fn parse_kv_line(line: &str) -> HashMap<&str, &str> {
    line.split_whitespace()
        .filter_map(|token| token.split_once('='))
        .collect()
}

/// Normalize a raw node state.
///
/// Slurm decorates states with trailing markers (`*` not responding,
/// `~` powered down, `#` powering up, ...); those are presentation noise
/// and are stripped. Flag suffixes joined with `+` (`MIXED+DRAIN`,
/// `IDLE+DOWN`) are semantically significant and preserved.
fn clean_node_state(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['*', '~', '#', '$', '@', '^', '-'])
        .trim()
        .to_uppercase()
}

fn cpu_util(cpu_load_raw: &str, cpu_total: i64) -> (f64, bool) {
    let Some(load) = parse_float_field(cpu_load_raw) else {
        return (0.0, false);
    };
    if cpu_total <= 0 {
        return (0.0, false);
    }
    let pct = load / cpu_total as f64 * 100.0;
    if pct.is_nan() || pct.is_infinite() {
        return (0.0, false);
    }
    (pct.max(0.0), true)
}

/// Memory utilization from `FreeMem`/`RealMemory`.
/// `FreeMem=0` is a valid reading (100% used), unlike `N/A`.
fn mem_util(free_mem_raw: &str, total_mem: i64) -> (f64, bool) {
    if total_mem <= 0 {
        return (0.0, false);
    }
    let trimmed = free_mem_raw.trim();
    if trimmed.is_empty() || trimmed == "N/A" || trimmed == "(null)" {
        return (0.0, false);
    }
    let Some(free_mem) = leading_int_opt(trimmed) else {
        return (0.0, false);
    };
    if free_mem < 0 {
        return (0.0, false);
    }

    let used = (total_mem - free_mem).max(0);
    (used as f64 / total_mem as f64 * 100.0, true)
}

fn alloc_util_pct(alloc: i64, total: i64) -> (f64, bool) {
    if total <= 0 {
        return (0.0, false);
    }
    let alloc = alloc.max(0);
    let pct = alloc as f64 / total as f64 * 100.0;
    (pct.min(100.0), true)
}

/// Sum the `gres/gpu*` entries of a TRES list.
fn tres_gpu_count(tres: &str) -> i64 {
    tres_entries(tres)
        .filter(|(key, _)| key.starts_with("gres/gpu"))
        .map(|(_, value)| leading_int(value))
        .sum()
}
