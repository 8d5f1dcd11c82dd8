use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Which of the two extracts a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceSide {
    #[serde(rename = "source_a")]
    A,
    #[serde(rename = "source_b")]
    B,
}

impl std::fmt::Display for SourceSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "source_a"),
            Self::B => write!(f, "source_b"),
        }
    }
}

/// A single scalar cell as delivered by a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
}

impl Cell {
    /// Text form of the cell. Whole floats print without decimals.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
            Cell::Float(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

/// Rows of cells as parsed from one source. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<Cell>>,
    /// Lines the reader skipped (bad field count, undecodable record).
    pub rejected_rows: usize,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { header: None, rows, rejected_rows: 0 }
    }

    pub fn with_header(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { header: Some(header), rows, rejected_rows: 0 }
    }

    /// Cell at (row, col); short rows read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Canonical key → summed amount in major units.
///
/// Every per-key sum and the running total stay inside the decimal range:
/// an addition that would leave it is refused and changes nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedAggregate {
    sums: BTreeMap<String, Decimal>,
    total: Decimal,
}

impl KeyedAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: String, amount: Decimal) -> Result<(), ReconError> {
        let current = self.sums.get(&key).copied().unwrap_or(Decimal::ZERO);
        let (Some(sum), Some(total)) =
            (current.checked_add(amount), self.total.checked_add(amount))
        else {
            return Err(ReconError::AmountOverflow(format!(
                "adding {amount} to key '{key}' exceeds the decimal range"
            )));
        };
        self.sums.insert(key, sum);
        self.total = total;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Decimal> {
        self.sums.get(key).copied()
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.sums.keys()
    }
}

/// Row accounting for one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    /// Rows handed to the normalizer (header excluded).
    pub rows_read: usize,
    /// Rows removed by the tag filter.
    pub rows_filtered: usize,
    /// Rows whose amount cell is not numeric.
    pub rows_bad_amount: usize,
    /// Rows whose canonical key is empty.
    pub rows_bad_key: usize,
    /// Lines the reader rejected before normalization.
    pub rows_rejected: usize,
    /// Rows summed into the aggregate.
    pub rows_aggregated: usize,
}

impl NormalizeStats {
    /// Malformed rows dropped anywhere between reader and aggregate.
    pub fn dropped(&self) -> usize {
        self.rows_bad_amount + self.rows_bad_key + self.rows_rejected
    }
}

/// Result of normalizing one table.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub aggregate: KeyedAggregate,
    /// Business date, only for rules that carry a date field.
    pub transaction_date: Option<NaiveDate>,
    pub stats: NormalizeStats,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceItem {
    pub key: String,
    pub amount_a: Decimal,
    pub amount_b: Decimal,
    /// Always `amount_a - amount_b`.
    pub diff: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub total_a: Decimal,
    pub total_b: Decimal,
    /// `total_a - total_b`.
    pub total_variance: Decimal,
    /// Sorted by key ascending.
    pub items: Vec<VarianceItem>,
}

// ---------------------------------------------------------------------------
// Runs + history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOrigin {
    #[default]
    Auto,
    Manual,
}

impl std::fmt::Display for RunOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub run_time: DateTime<Utc>,
    #[serde(with = "business_date")]
    pub transaction_date: Option<NaiveDate>,
    pub total_a: Decimal,
    pub total_b: Decimal,
    pub total_variance: Decimal,
    pub items: Vec<VarianceItem>,
    pub origin: RunOrigin,
}

impl ReconciliationRun {
    pub fn new(
        run_time: DateTime<Utc>,
        transaction_date: Option<NaiveDate>,
        recon: Reconciliation,
        origin: RunOrigin,
    ) -> Self {
        Self {
            run_time,
            transaction_date,
            total_a: recon.total_a,
            total_b: recon.total_b,
            total_variance: recon.total_variance,
            items: recon.items,
            origin,
        }
    }

    /// `YYYY-MM-DD`, or `Unknown` when the date could not be extracted.
    pub fn transaction_date_label(&self) -> String {
        business_date::label(&self.transaction_date)
    }
}

/// Ordered run log, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    runs: Vec<ReconciliationRun>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap runs that are already newest-first.
    pub fn from_runs(runs: Vec<ReconciliationRun>) -> Self {
        Self { runs }
    }

    pub fn runs(&self) -> &[ReconciliationRun] {
        &self.runs
    }

    pub fn newest(&self) -> Option<&ReconciliationRun> {
        self.runs.first()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub(crate) fn prepend_bounded(mut self, run: ReconciliationRun, max_runs: usize) -> Self {
        self.runs.insert(0, run);
        self.runs.truncate(max_runs);
        self
    }

    pub fn from_json(input: &str) -> Result<Self, String> {
        serde_json::from_str(input).map_err(|e| e.to_string())
    }

    pub fn to_json_pretty(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

/// Persisted form of the business date: `YYYY-MM-DD` or `Unknown`.
mod business_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const UNKNOWN: &str = "Unknown";

    pub fn label(date: &Option<NaiveDate>) -> String {
        match date {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => UNKNOWN.to_string(),
        }
    }

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&label(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
    }
}
