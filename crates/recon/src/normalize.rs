//! Table Normalizer: one raw table + rule → keyed aggregate.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::columns::{resolve_column, ColumnStrategy, NameMatch, ResolvedBy};
use crate::config::{HeaderRow, NormalizationRule};
use crate::error::ReconError;
use crate::keycodec::{canonicalize, canonicalize_cell};
use crate::model::{Cell, KeyedAggregate, NormalizeStats, Normalized, RawTable, SourceSide};

/// Reduce `table` to per-key sums according to `rule`.
///
/// Rows failing the filter are discarded. Rows whose amount is not numeric,
/// whose key is empty, or whose amount would push a sum out of the decimal
/// range are dropped and counted as malformed. A table with no rows left
/// after the filter, or none left to aggregate, is an `EmptySource` error.
pub fn normalize(
    table: &RawTable,
    rule: &NormalizationRule,
    side: SourceSide,
) -> Result<Normalized, ReconError> {
    let (header, rows) = split_header(table, rule);
    if rule.header == HeaderRow::Detect {
        log::debug!("{side}: header row {}", if header.is_some() { "detected" } else { "absent" });
    }
    let header = header.as_deref();
    let key_col = resolve_column(&rule.key, header);
    let amount_col = resolve_column(&rule.amount, header);

    if key_col.by == ResolvedBy::Position && !rule.key.keywords.is_empty() {
        log::debug!("{side}: no header matched {:?}, key at column {}", rule.key.keywords, key_col.index);
    }
    if amount_col.by == ResolvedBy::Position && !rule.amount.keywords.is_empty() {
        log::debug!(
            "{side}: no header matched {:?}, amount at column {}",
            rule.amount.keywords,
            amount_col.index
        );
    }

    let mut stats = NormalizeStats {
        rows_read: rows.len(),
        rows_rejected: table.rejected_rows,
        ..Default::default()
    };

    let retained: Vec<&Vec<Cell>> = match rule.filter {
        Some(ref filter) => rows
            .iter()
            .filter(|row| {
                row.get(filter.column)
                    .map(|c| c.to_text().trim() == filter.equals)
                    .unwrap_or(false)
            })
            .collect(),
        None => rows.iter().collect(),
    };
    stats.rows_filtered = stats.rows_read - retained.len();

    if retained.is_empty() {
        let detail = match rule.filter {
            Some(ref f) if stats.rows_read > 0 => {
                format!("no rows with '{}' in column {}", f.equals, f.column)
            }
            _ => "table has no data rows".to_string(),
        };
        return Err(ReconError::empty_source(side, detail));
    }

    let transaction_date = rule.date.as_ref().and_then(|d| {
        let cell = retained[0].get(d.position).unwrap_or(&Cell::Empty);
        compact_date(cell)
    });

    let unit = Decimal::new(1, rule.amount_scale);
    let mut aggregate = KeyedAggregate::new();

    for row in &retained {
        let amount = row
            .get(amount_col.index)
            .and_then(parse_amount)
            .and_then(|a| a.checked_mul(unit));
        let Some(amount) = amount else {
            stats.rows_bad_amount += 1;
            continue;
        };

        let key = row
            .get(key_col.index)
            .map(|c| canonicalize_cell(c, rule.key_max_len))
            .unwrap_or_default();
        if key.is_empty() {
            stats.rows_bad_key += 1;
            continue;
        }

        if let Err(e) = aggregate.add(key, amount) {
            log::warn!("{side}: row dropped, {e}");
            stats.rows_bad_amount += 1;
            continue;
        }
        stats.rows_aggregated += 1;
    }

    if aggregate.is_empty() {
        return Err(ReconError::empty_source(
            side,
            format!("none of {} retained rows had a numeric amount and a key", retained.len()),
        ));
    }

    if stats.dropped() > 0 {
        log::warn!(
            "{side}: dropped {} malformed row(s) ({} rejected by reader, {} non-numeric amount, {} empty key)",
            stats.dropped(),
            stats.rows_rejected,
            stats.rows_bad_amount,
            stats.rows_bad_key,
        );
    }
    log::info!(
        "{side}: {} row(s) aggregated into {} key(s), total {}",
        stats.rows_aggregated,
        aggregate.len(),
        aggregate.total()
    );

    Ok(Normalized { aggregate, transaction_date, stats })
}

/// Separate the header from the data rows.
///
/// Under `HeaderRow::Detect` the first row is a header only when it has no
/// number at the amount position and it either mentions a selector keyword
/// or holds no number at all. Anything else is data and goes through the
/// usual row accounting.
fn split_header<'t>(
    table: &'t RawTable,
    rule: &NormalizationRule,
) -> (Option<Vec<String>>, &'t [Vec<Cell>]) {
    if table.header.is_some() || rule.header != HeaderRow::Detect {
        return (table.header.clone(), &table.rows);
    }
    match table.rows.split_first() {
        Some((first, rest)) if is_header_row(first, rule) => {
            let names = first.iter().map(|c| c.to_text().trim().to_string()).collect();
            (Some(names), rest)
        }
        _ => (None, &table.rows),
    }
}

fn is_header_row(row: &[Cell], rule: &NormalizationRule) -> bool {
    let amount = row.get(rule.amount.position).unwrap_or(&Cell::Empty);
    if parse_amount(amount).is_some() {
        return false;
    }
    let names: Vec<String> = row.iter().map(Cell::to_text).collect();
    let mentions_keyword = [&rule.key.keywords, &rule.amount.keywords]
        .into_iter()
        .any(|keywords| {
            NameMatch { keywords: keywords.as_slice() }.resolve(Some(names.as_slice())).is_some()
        });
    mentions_keyword || row.iter().all(|c| parse_amount(c).is_none())
}

/// Numeric value of a cell, or `None` for anything that is not a number.
pub fn parse_amount(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Empty => None,
        Cell::Int(n) => Some(Decimal::from(*n)),
        Cell::Float(n) if n.is_finite() => Decimal::from_str(&format!("{n}")).ok(),
        Cell::Float(_) => None,
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
    }
}

/// `20240115` (text or number) → 2024-01-15. Shorter or invalid → `None`.
pub fn compact_date(cell: &Cell) -> Option<NaiveDate> {
    let text = canonicalize(&cell.to_text(), None);
    if text.chars().count() < 8 {
        return None;
    }
    let digits = text.get(..8)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = digits[..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
