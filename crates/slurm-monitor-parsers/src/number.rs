//! Numeric field extraction.

/// Parse the longest leading signed-decimal prefix of a field.
///
/// Slurm renders some numeric fields with trailing annotations
/// (`16.00`, `128000M`); the integer part is all we aggregate. Returns 0
/// when the field is empty or has no leading digits.
pub fn leading_int(v: &str) -> i64 {
    leading_int_opt(v).unwrap_or(0)
}

/// As [`leading_int`], but distinguishing "no digits" from a real 0.
pub fn leading_int_opt(v: &str) -> Option<i64> {
    let v = v.trim();
    let mut end = 0;
    for (i, c) in v.char_indices() {
        if i == 0 && c == '-' {
            end = i + c.len_utf8();
            continue;
        }
        if c.is_ascii_digit() {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    v[..end].parse().ok()
}

/// Parse a float field, treating the Slurm placeholders as absent.
///
/// `N/A` and `(null)` both appear in `scontrol` output for values the
/// controller does not know; they are distinct from a real 0.
pub fn parse_float_field(v: &str) -> Option<f64> {
    let v = v.trim();
    if v.is_empty() || v == "N/A" || v == "(null)" {
        return None;
    }
    v.parse().ok()
}
