use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Schema constants
// ---------------------------------------------------------------------------
//
// Positions are zero-based. Source A is the headerless fixed-schema
// settlement file; source B is the spreadsheet export whose headers drift.

/// Literal in column 0 that marks a source A transaction row.
pub const IPAI_TAG: &str = "IPAI";
pub const IPAI_TAG_COLUMN: usize = 0;
/// Compact `YYYYMMDD` business date.
pub const IPAI_DATE_COLUMN: usize = 8;
/// Amount in minor units (cents).
pub const IPAI_AMOUNT_COLUMN: usize = 13;
pub const IPAI_KEY_COLUMN: usize = 14;
/// Widest source A row accepted by the reader.
pub const IPAI_MAX_COLUMNS: usize = 35;
/// Source A amounts carry two implied decimal places.
pub const IPAI_AMOUNT_SCALE: u32 = 2;

pub const EXPORT_KEY_COLUMN: usize = 0;
pub const EXPORT_AMOUNT_COLUMN: usize = 2;
pub const EXPORT_KEY_KEYWORDS: &[&str] = &["meter"];
pub const EXPORT_AMOUNT_KEYWORDS: &[&str] = &["amount", "total"];
pub const EXPORT_MAX_COLUMNS: usize = 256;

/// Common prefix length the two sources are joined on.
pub const KEY_PREFIX_LEN: usize = 11;
/// Per-key variance must exceed this to be reported.
pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const MAX_HISTORY_RUNS: usize = 31;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_tolerance")]
    pub tolerance: Decimal,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default = "NormalizationRule::settlement_file")]
    pub source_a: NormalizationRule,
    #[serde(default = "NormalizationRule::spreadsheet_export")]
    pub source_b: NormalizationRule,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            tolerance: DEFAULT_TOLERANCE,
            history: HistoryConfig::default(),
            source_a: NormalizationRule::settlement_file(),
            source_b: NormalizationRule::spreadsheet_export(),
        }
    }
}

fn default_name() -> String {
    "meter-recon".into()
}

fn default_tolerance() -> Decimal {
    DEFAULT_TOLERANCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_runs")]
    pub max_runs: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_runs: MAX_HISTORY_RUNS }
    }
}

fn default_max_runs() -> usize {
    MAX_HISTORY_RUNS
}

// ---------------------------------------------------------------------------
// Normalization rule
// ---------------------------------------------------------------------------

/// Whether the first non-blank row of a table names the columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderRow {
    #[default]
    Absent,
    Present,
    /// Decided per table by the normalizer from the first row's content.
    Detect,
}

/// How to reduce one raw table to a keyed aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRule {
    #[serde(default)]
    pub header: HeaderRow,
    /// Rows wider than this are rejected by the reader.
    #[serde(default = "default_max_columns")]
    pub max_columns: usize,
    /// Amounts are stored in units of 10^-scale; 0 means major units.
    #[serde(default)]
    pub amount_scale: u32,
    /// Canonical keys are cut to this many characters. `None` keeps them whole.
    #[serde(default = "default_key_max_len", skip_serializing_if = "Option::is_none")]
    pub key_max_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowFilter>,
    pub key: ColumnSelector,
    pub amount: ColumnSelector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateField>,
}

fn default_max_columns() -> usize {
    EXPORT_MAX_COLUMNS
}

fn default_key_max_len() -> Option<usize> {
    Some(KEY_PREFIX_LEN)
}

/// Keep only rows whose `column` equals `equals` (after trimming).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: usize,
    pub equals: String,
}

/// Column chosen by header keyword first, then by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSelector {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    pub position: usize,
}

impl ColumnSelector {
    pub fn at(position: usize) -> Self {
        Self { keywords: Vec::new(), position }
    }

    pub fn named(keywords: &[&str], fallback: usize) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            position: fallback,
        }
    }
}

/// Compact numeric date read from the first retained row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateField {
    pub position: usize,
}

impl NormalizationRule {
    /// Headerless settlement extract: `IPAI`-tagged rows, cents, date in column 8.
    pub fn settlement_file() -> Self {
        Self {
            header: HeaderRow::Absent,
            max_columns: IPAI_MAX_COLUMNS,
            amount_scale: IPAI_AMOUNT_SCALE,
            key_max_len: Some(KEY_PREFIX_LEN),
            filter: Some(RowFilter {
                column: IPAI_TAG_COLUMN,
                equals: IPAI_TAG.into(),
            }),
            key: ColumnSelector::at(IPAI_KEY_COLUMN),
            amount: ColumnSelector::at(IPAI_AMOUNT_COLUMN),
            date: Some(DateField { position: IPAI_DATE_COLUMN }),
        }
    }

    /// Spreadsheet export; the header row is optional and columns are found
    /// by name when it is there.
    pub fn spreadsheet_export() -> Self {
        Self {
            header: HeaderRow::Detect,
            max_columns: EXPORT_MAX_COLUMNS,
            amount_scale: 0,
            key_max_len: Some(KEY_PREFIX_LEN),
            filter: None,
            key: ColumnSelector::named(EXPORT_KEY_KEYWORDS, EXPORT_KEY_COLUMN),
            amount: ColumnSelector::named(EXPORT_AMOUNT_KEYWORDS, EXPORT_AMOUNT_COLUMN),
            date: None,
        }
    }

    fn validate(&self, side: &str) -> Result<(), ReconError> {
        let within = |what: &str, position: usize| {
            if position >= self.max_columns {
                Err(ReconError::ConfigValidation(format!(
                    "{side}: {what} position {position} is outside max_columns {}",
                    self.max_columns
                )))
            } else {
                Ok(())
            }
        };

        if self.max_columns == 0 {
            return Err(ReconError::ConfigValidation(format!(
                "{side}: max_columns must be at least 1"
            )));
        }
        within("key", self.key.position)?;
        within("amount", self.amount.position)?;
        if let Some(ref date) = self.date {
            within("date", date.position)?;
        }
        if let Some(ref filter) = self.filter {
            within("filter", filter.column)?;
            if filter.equals.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "{side}: filter literal must not be empty"
                )));
            }
        }
        if self.key_max_len == Some(0) {
            return Err(ReconError::ConfigValidation(format!(
                "{side}: key_max_len must be at least 1"
            )));
        }
        if self.amount_scale > 28 {
            return Err(ReconError::ConfigValidation(format!(
                "{side}: amount_scale {} exceeds 28",
                self.amount_scale
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.tolerance.is_sign_negative() {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance must not be negative, got {}",
                self.tolerance
            )));
        }

        if self.history.max_runs == 0 {
            return Err(ReconError::ConfigValidation(
                "history.max_runs must be at least 1".into(),
            ));
        }

        self.source_a.validate("source_a")?;
        self.source_b.validate("source_b")?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_config_uses_builtin_rules() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config, ReconConfig::default());
        assert_eq!(config.tolerance, dec!(0.01));
        assert_eq!(config.history.max_runs, 31);
        assert_eq!(config.source_a.key.position, 14);
        assert_eq!(config.source_a.amount.position, 13);
        assert_eq!(config.source_a.date, Some(DateField { position: 8 }));
        assert_eq!(config.source_a.filter.as_ref().unwrap().equals, "IPAI");
        assert_eq!(config.source_a.header, HeaderRow::Absent);
        assert_eq!(config.source_b.header, HeaderRow::Detect);
        assert_eq!(config.source_b.key.keywords, vec!["meter"]);
        assert_eq!(config.source_b.amount.keywords, vec!["amount", "total"]);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ReconConfig::default();
        let text = config.to_toml().unwrap();
        let back = ReconConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn parse_custom_rule() {
        let input = r#"
name = "Nightly"
tolerance = "0.05"

[history]
max_runs = 10

[source_b]
header = "present"
key_max_len = 9

[source_b.key]
keywords = ["account"]
position = 1

[source_b.amount]
keywords = ["paid"]
position = 4
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.name, "Nightly");
        assert_eq!(config.tolerance, dec!(0.05));
        assert_eq!(config.history.max_runs, 10);
        assert_eq!(config.source_b.header, HeaderRow::Present);
        assert_eq!(config.source_b.key_max_len, Some(9));
        assert_eq!(config.source_b.key.keywords, vec!["account"]);
        assert_eq!(config.source_b.amount.position, 4);
        assert_eq!(config.source_b.amount_scale, 0);
        // Untouched side keeps its built-in rule
        assert_eq!(config.source_a, NormalizationRule::settlement_file());
    }

    #[test]
    fn reject_negative_tolerance() {
        let err = ReconConfig::from_toml("tolerance = \"-0.01\"").unwrap_err();
        assert!(err.to_string().contains("tolerance must not be negative"));
    }

    #[test]
    fn reject_zero_history() {
        let err = ReconConfig::from_toml("[history]\nmax_runs = 0").unwrap_err();
        assert!(err.to_string().contains("max_runs"));
    }

    #[test]
    fn reject_position_outside_row_width() {
        let mut config = ReconConfig::default();
        config.source_a.key.position = 35;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source_a: key position 35"));
    }

    #[test]
    fn reject_empty_filter_literal() {
        let mut config = ReconConfig::default();
        config.source_a.filter = Some(RowFilter { column: 0, equals: " ".into() });
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_shape() {
        let err = ReconConfig::from_toml("[source_a]\nheader = \"yes\"").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }
}
