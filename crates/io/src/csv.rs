// Delimited-text reader for source A (and CSV-shaped source B exports)

use reconbot_recon::model::{Cell, RawTable};

/// Parse delimited bytes into a table.
///
/// Rows wider than `max_columns` and records the reader cannot decode are
/// skipped and counted in `rejected_rows`; the rest of the file still loads.
/// Blank lines are ignored.
pub fn parse_delimited(bytes: &[u8], has_header: bool, max_columns: usize) -> Result<RawTable, String> {
    let content = decode_text(bytes);
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(content, max_columns);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut rejected = 0usize;

    for (line_idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::debug!("record {}: skipped ({})", line_idx + 1, e);
                rejected += 1;
                continue;
            }
        };

        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        if has_header && header.is_none() {
            header = Some(record.iter().map(|f| f.trim().to_string()).collect());
            continue;
        }

        if record.len() > max_columns {
            log::debug!(
                "record {}: {} fields exceeds {} columns, skipped",
                line_idx + 1,
                record.len(),
                max_columns
            );
            rejected += 1;
            continue;
        }

        rows.push(record.iter().map(Cell::from).collect());
    }

    if rejected > 0 {
        log::warn!("skipped {} malformed line(s)", rejected);
    }

    Ok(RawTable { header, rows, rejected_rows: rejected })
}

const SNIFF_LINES: usize = 10;

/// Pick the field delimiter from the first non-blank lines.
///
/// Comma is the settlement format's delimiter and wins ties. Another
/// candidate takes over only when more sample lines agree with its split of
/// the first line. A split narrower than two fields or wider than
/// `max_columns` is not a candidate at all.
fn sniff_delimiter(content: &str, max_columns: usize) -> u8 {
    const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    let sample = sample.join("\n");

    let mut best = (b',', 0usize);
    for delim in CANDIDATES {
        let widths: Vec<usize> = csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(sample.as_bytes())
            .records()
            .map(|r| r.map(|r| r.len()).unwrap_or(0))
            .collect();

        let Some(&first) = widths.first() else { continue };
        if first < 2 || first > max_columns {
            continue;
        }
        let agreeing = widths.iter().filter(|&&w| w == first).count();
        if agreeing > best.1 {
            best = (delim, agreeing);
        }
    }

    best.0
}

/// Bytes to text: UTF-8 first, Windows-1252 fallback (common for exported CSVs).
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement_line(tag: &str, date: &str, cents: &str, meter: &str) -> String {
        let mut fields = vec![String::new(); 35];
        fields[0] = tag.into();
        fields[8] = date.into();
        fields[13] = cents.into();
        fields[14] = meter.into();
        fields.join(",")
    }

    #[test]
    fn headerless_rows_keep_positions() {
        let data = format!(
            "{}\n{}\n",
            settlement_line("IPAI", "20240115", "50000", "1001"),
            settlement_line("X", "20240115", "1", "1002"),
        );
        let table = parse_delimited(data.as_bytes(), false, 35).unwrap();
        assert!(table.header.is_none());
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, 0), &Cell::Text("IPAI".into()));
        assert_eq!(table.cell(0, 13), &Cell::Text("50000".into()));
        assert_eq!(table.cell(0, 14), &Cell::Text("1001".into()));
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.rejected_rows, 0);
    }

    #[test]
    fn over_wide_and_short_lines() {
        let wide = vec!["x"; 40].join(",");
        let data = format!(
            "HDR,20240115\n{}\n{}\n\nTRL,1\n",
            settlement_line("IPAI", "20240115", "100", "1001"),
            wide,
        );
        let table = parse_delimited(data.as_bytes(), false, 35).unwrap();
        // header/trailer lines load (filtered later); the 40-field line does not
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rejected_rows, 1);
        assert_eq!(table.cell(2, 0), &Cell::Text("TRL".into()));
    }

    #[test]
    fn header_row_is_split_off() {
        let data = "Meter No;Description;Amount\n1001;prepaid;495.00\n";
        let table = parse_delimited(data.as_bytes(), true, 256).unwrap();
        assert_eq!(
            table.header,
            Some(vec!["Meter No".to_string(), "Description".into(), "Amount".into()])
        );
        assert_eq!(table.rows, vec![vec![
            Cell::Text("1001".into()),
            Cell::Text("prepaid".into()),
            Cell::Text("495.00".into()),
        ]]);
    }

    #[test]
    fn windows_1252_fallback() {
        // "Café" in Windows-1252
        let bytes = b"Meter,Desc,Amount\n1001,Caf\xe9,1.00\n";
        let table = parse_delimited(bytes, true, 256).unwrap();
        assert_eq!(table.cell(0, 1), &Cell::Text("Café".into()));
    }

    #[test]
    fn bom_is_ignored() {
        let data = "\u{feff}IPAI,1,2\n";
        let table = parse_delimited(data.as_bytes(), false, 35).unwrap();
        assert_eq!(table.cell(0, 0), &Cell::Text("IPAI".into()));
    }

    #[test]
    fn sniff_finds_the_splitting_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n", 256), b';');
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n", 256), b',');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n", 256), b'\t');
        assert_eq!(sniff_delimiter("", 256), b',');
    }

    #[test]
    fn sniff_keeps_comma_on_a_tie() {
        // Semicolons inside a description split just as consistently
        assert_eq!(sniff_delimiter("1001,a;b\n1002,c;d\n", 256), b',');
    }

    #[test]
    fn sniff_ignores_splits_wider_than_a_row() {
        let settlement = settlement_line("IPAI", "20240115", "100", "1001");
        assert_eq!(sniff_delimiter(&settlement, 35), b',');
        // 40 pipe-separated fields cannot be a 35-column row
        let piped = vec!["x"; 40].join("|");
        assert_eq!(sniff_delimiter(&format!("{piped}\n{piped}\n"), 35), b',');
    }
}
