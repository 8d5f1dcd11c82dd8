use std::fmt;

use crate::model::SourceSide;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad position, negative tolerance, etc.).
    ConfigValidation(String),
    /// One or both raw tables were not supplied. Nothing is recorded.
    SourceUnavailable { missing: Vec<SourceSide> },
    /// A table parsed but no rows survived the filter or coercion.
    EmptySource { source: SourceSide, detail: String },
    /// History persist failed. The computed run is still valid.
    HistoryStore(String),
    /// Notifier delivery failed.
    Notify(String),
    /// A sum or difference of amounts left the decimal range.
    AmountOverflow(String),
}

impl ReconError {
    pub fn empty_source(source: SourceSide, detail: impl Into<String>) -> Self {
        Self::EmptySource { source, detail: detail.into() }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::SourceUnavailable { missing } => {
                let names: Vec<String> = missing.iter().map(|s| s.to_string()).collect();
                write!(f, "source unavailable: {}", names.join(", "))
            }
            Self::EmptySource { source, detail } => {
                write!(f, "{source}: no usable rows ({detail})")
            }
            Self::HistoryStore(msg) => write!(f, "history store error: {msg}"),
            Self::Notify(msg) => write!(f, "notify error: {msg}"),
            Self::AmountOverflow(msg) => write!(f, "amount overflow: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
