//! Memory parsing for Slurm unit-suffixed values.

use crate::number::leading_int;
use crate::tres_entries;

/// Scale a value carrying an optional `K`/`M`/`G`/`T` suffix to megabytes.
/// Unit-less values are taken as MB.
fn scale_to_mb(value: i64, unit: Option<char>) -> i64 {
    match unit {
        Some('K') | Some('k') => value / 1024,
        Some('M') | Some('m') => value,
        Some('G') | Some('g') => value * 1024,
        Some('T') | Some('t') => value * 1024 * 1024,
        _ => value,
    }
}

fn is_unit_char(c: char) -> bool {
    matches!(c, 'K' | 'k' | 'M' | 'm' | 'G' | 'g' | 'T' | 't')
}

/// Parse a squeue `%m` memory request into MB.
///
/// Slurm may append `c`/`n` for per-cpu/per-node semantics; the marker is
/// stripped and the value treated as an MB-equivalent scalar. Empty and
/// `N/A` requests parse to 0.
pub fn parse_mem_request_mb(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() || raw == "N/A" {
        return 0;
    }

    let stripped = match raw.chars().last() {
        Some('c') | Some('C') | Some('n') | Some('N') => &raw[..raw.len() - 1],
        _ => raw,
    };
    if stripped.is_empty() {
        return 0;
    }

    let (num_part, unit) = match stripped.chars().last() {
        Some(c) if is_unit_char(c) => (&stripped[..stripped.len() - 1], Some(c)),
        _ => (stripped, None),
    };
    scale_to_mb(leading_int(num_part), unit)
}

/// Extract the `mem=` entry of a TRES list and convert it to MB.
///
/// Used as a fallback when `AllocMem` reports 0 but `AllocTRES` still
/// carries an allocation. Returns 0 when no `mem=` entry is present.
pub fn parse_tres_mem_mb(tres: &str) -> i64 {
    for (key, value) in tres_entries(tres) {
        if key != "mem" {
            continue;
        }
        if value.is_empty() {
            return 0;
        }
        let unit = value.chars().last().filter(|c| is_unit_char(*c));
        return scale_to_mb(leading_int(value), unit);
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mem_request_mb() {
        assert_eq!(parse_mem_request_mb("20G"), 20480);
        assert_eq!(parse_mem_request_mb("245090M"), 245090);
        assert_eq!(parse_mem_request_mb("500Mc"), 500);
        assert_eq!(parse_mem_request_mb("4Gn"), 4096);
        assert_eq!(parse_mem_request_mb("4096"), 4096);
        assert_eq!(parse_mem_request_mb("2048K"), 2);
        assert_eq!(parse_mem_request_mb("1T"), 1024 * 1024);
        assert_eq!(parse_mem_request_mb(""), 0);
        assert_eq!(parse_mem_request_mb("N/A"), 0);
    }

    #[test]
    fn test_parse_mem_request_mb_marker_only() {
        assert_eq!(parse_mem_request_mb("c"), 0);
    }

    #[test]
    fn test_parse_tres_mem_mb() {
        assert_eq!(parse_tres_mem_mb("cpu=8,mem=12G,billing=8"), 12288);
        assert_eq!(parse_tres_mem_mb("cpu=8,mem=128000M"), 128000);
        assert_eq!(parse_tres_mem_mb("cpu=8,billing=8"), 0);
        assert_eq!(parse_tres_mem_mb(""), 0);
    }
}
