//! Canonical join keys.
//!
//! Meter numbers arrive as text in one source and as spreadsheet numbers in
//! the other, so the same meter can show up as `"1001"`, `1001.0` or
//! `"1001.0 "`. Both sides are reduced to one textual form before grouping.

use crate::model::Cell;

/// Canonicalize a cell into a join key.
pub fn canonicalize_cell(cell: &Cell, max_len: Option<usize>) -> String {
    canonicalize(&cell.to_text(), max_len)
}

/// Canonicalize a textual key.
///
/// Steps: trim, cut to `max_len` characters, drop a numeric fraction
/// (`1001.0` → `1001`). Idempotent for every input.
pub fn canonicalize(raw: &str, max_len: Option<usize>) -> String {
    let trimmed = raw.trim();
    let cut = match max_len {
        Some(n) => match trimmed.char_indices().nth(n) {
            Some((byte_idx, _)) => trimmed[..byte_idx].trim_end(),
            None => trimmed,
        },
        None => trimmed,
    };
    strip_fraction(cut).to_string()
}

/// `digits '.' digits*` → the integer digits; anything else unchanged.
fn strip_fraction(s: &str) -> &str {
    match s.split_once('.') {
        Some((int, frac))
            if !int.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit()) =>
        {
            int
        }
        _ => s,
    }
}
