//! Read-only gate and result aggregation wrapper

use asof_core::{AsOfError, Result};

/// Returns true if `sql` starts with `SELECT` or `WITH`.
///
/// Leading ASCII whitespace is skipped, the keyword is matched
/// case-insensitively and must be followed by ASCII whitespace or the end of
/// the text. This is a prefix check only; the host still executes the query
/// read-only.
pub fn is_read_only_query(sql: &str) -> bool {
    let trimmed = sql.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8));
    let bytes = trimmed.as_bytes();
    ["select", "with"].iter().any(|kw| {
        bytes.len() >= kw.len()
            && bytes[..kw.len()].eq_ignore_ascii_case(kw.as_bytes())
            && bytes.get(kw.len()).map_or(true, |b| is_space(*b))
    })
}

/// ASCII whitespace, vertical tab included
fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace() || b == 0x0b
}

/// Reject anything [`is_read_only_query`] does not accept
pub fn ensure_read_only(sql: &str) -> Result<()> {
    if is_read_only_query(sql) {
        Ok(())
    } else {
        Err(AsOfError::unsupported_query("only SELECT queries are allowed"))
    }
}

/// Wrap `sql` so the result set comes back as one JSON array value
pub fn wrap_query(sql: &str) -> String {
    format!(
        "SELECT COALESCE(json_agg(row_to_json(q)), '[]'::json)::jsonb FROM ({}) q",
        sql
    )
}
