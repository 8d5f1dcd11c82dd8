// Raw attachment bytes → RawTable, per source rule

use reconbot_recon::config::{HeaderRow, NormalizationRule, ReconConfig};
use reconbot_recon::model::{RawTable, SourceSide};
use reconbot_recon::ReconError;

use crate::attachment::Attachments;

use crate::csv::parse_delimited;
use crate::gzip::maybe_gunzip;
use crate::xlsx::parse_workbook;

// Only a known header is split off here. Under `HeaderRow::Detect` every
// row is handed on and the normalizer decides.
fn splits_header(rule: &NormalizationRule) -> bool {
    rule.header == HeaderRow::Present
}

/// Source A: (optionally gzipped) delimited text.
pub fn read_source_a(bytes: &[u8], rule: &NormalizationRule) -> Result<RawTable, String> {
    let text = maybe_gunzip(bytes)?;
    parse_delimited(&text, splits_header(rule), rule.max_columns)
}

/// Source B: a workbook, or delimited text from exporters that mislabel CSV.
pub fn read_source_b(bytes: &[u8], rule: &NormalizationRule) -> Result<RawTable, String> {
    let bytes = maybe_gunzip(bytes)?;
    match parse_workbook(&bytes, splits_header(rule)) {
        Ok(table) => Ok(table),
        Err(e) if looks_like_text(&bytes) => {
            log::debug!("source_b is not a workbook ({e}); reading as delimited text");
            parse_delimited(&bytes, splits_header(rule), rule.max_columns)
        }
        Err(e) => Err(e),
    }
}

/// Parse both attachments with the configured rules.
///
/// A file that cannot be read at all is reported like an empty source: the
/// run cannot proceed and nothing is recorded.
pub fn read_attachments(
    attachments: &Attachments,
    config: &ReconConfig,
) -> Result<(RawTable, RawTable), ReconError> {
    let a = read_source_a(&attachments.source_a, &config.source_a).map_err(|e| {
        ReconError::empty_source(SourceSide::A, format!("{}: {e}", attachments.source_a_name))
    })?;
    let b = read_source_b(&attachments.source_b, &config.source_b).map_err(|e| {
        ReconError::empty_source(SourceSide::B, format!("{}: {e}", attachments.source_b_name))
    })?;
    log::info!(
        "read {} ({} rows) and {} ({} rows)",
        attachments.source_a_name,
        a.rows.len(),
        attachments.source_b_name,
        b.rows.len()
    );
    Ok((a, b))
}

fn looks_like_text(bytes: &[u8]) -> bool {
    !bytes.is_empty() && !bytes.iter().take(512).any(|&b| b == 0)
}
